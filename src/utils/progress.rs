//! Terminal rendering for transfer progress
//!
//! Produces a single line such as ` 42% [========>            ] 420 / 1000`
//! that fits in `width` columns, dropping the size and then the bar when the
//! line gets too narrow.

/// Snapshot handed to progress callbacks while a body is streamed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub transferred: u64,
    pub total: Option<u64>,
}

pub fn render_progress(current: u64, total: Option<u64>, width: usize) -> String {
    let total = match total {
        Some(total) if total > 0 => total,
        _ => {
            let message = format!("{} / unknown", current);
            return if message.len() < width {
                message
            } else {
                current.to_string()
            };
        }
    };

    let percent_width = 4;
    let bar_width = 3;
    let size_width = total.to_string().len() * 2 + 3;

    let mut available = width;
    let mut fields: Vec<(&str, usize)> = Vec::new();
    for (field, min_width) in [("percent", percent_width), ("bar", bar_width), ("size", size_width)] {
        if min_width < available {
            fields.push((field, min_width));
            available -= min_width + 1;
        }
    }

    let rendered: Vec<String> = fields
        .iter()
        .map(|(field, min_width)| match *field {
            "percent" => {
                let percent = format!("{}%", current.saturating_mul(100) / total);
                format!("{:>width$}", percent, width = *min_width)
            }
            "bar" => thermometer(current, total, *min_width + available),
            _ => {
                let size = format!("{} / {}", current, total);
                format!("{:>width$}", size, width = min_width - 1)
            }
        })
        .collect();

    rendered.join(" ")
}

fn thermometer(current: u64, total: u64, width: usize) -> String {
    let dots = width.saturating_sub(2);
    let ratio = (current.min(total) as f64) / (total as f64);
    let shaded = (ratio * dots as f64).floor() as usize;

    format!(
        "[{}>{}]",
        "=".repeat(shaded.saturating_sub(1)),
        " ".repeat(dots.saturating_sub(shaded))
    )
}
