use image_suite_core::{BatchOutcome, ItemStatus};

pub fn print_summary(outcome: &BatchOutcome) {
    println!("\n--- Summary ---");
    println!("{}", outcome.summary());

    if outcome.converted > 0 {
        let total: u64 = outcome
            .results
            .iter()
            .filter(|r| r.status == ItemStatus::Converted)
            .map(|r| r.output_bytes.len() as u64)
            .sum();
        println!("Output: {} file(s), {}", outcome.converted, format_size(total));
    }

    for r in outcome.errors() {
        if let Some(ref err) = r.error {
            println!("  ERROR {}: {}", r.source_name, err);
        }
    }
}

pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
