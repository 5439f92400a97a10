//! Plain-text formatting for terminal output.

use fintrack_core::models::{Transaction, TransactionSummary};

/// Format an amount with two decimals, thousands separators and a currency code
pub fn format_amount(amount: f64, currency: &str) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let negative = amount < 0.0 && fixed != "0.00";
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    format!("{}{}.{} {}", if negative { "-" } else { "" }, grouped, cents, currency)
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

pub fn summary_lines(summary: &TransactionSummary, currency: &str) -> Vec<String> {
    vec![
        format!("Balance   {:>16}", format_amount(summary.monthly_balance, currency)),
        format!("Expenses  {:>16}", format_amount(summary.monthly_expenses, currency)),
        format!("Savings   {:>16}", format_amount(summary.monthly_savings, currency)),
    ]
}

pub fn transaction_line(tx: &Transaction, currency: &str) -> String {
    format!(
        "{:<10}  {:<32}  {:>16}  {}",
        truncate(tx.date.as_deref().unwrap_or("-"), 10),
        truncate(tx.description.as_deref().unwrap_or(""), 32),
        format_amount(tx.amount, currency),
        tx.category.as_deref().unwrap_or(""),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0.0, "USD"), "0.00 USD");
        assert_eq!(format_amount(1234.5, "EUR"), "1,234.50 EUR");
        assert_eq!(format_amount(-54.2, "USD"), "-54.20 USD");
        assert_eq!(format_amount(1_000_000.0, "USD"), "1,000,000.00 USD");
        assert_eq!(format_amount(999.999, "USD"), "1,000.00 USD");
        assert_eq!(format_amount(-0.001, "USD"), "0.00 USD");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Groceries", 20), "Groceries");
        assert_eq!(truncate("Monthly rent payment", 10), "Monthly...");
        assert_eq!(truncate("abcdef", 2), "ab");
    }

    #[test]
    fn test_summary_lines() {
        let summary = TransactionSummary {
            monthly_balance: 1520.54,
            monthly_expenses: 300.0,
            monthly_savings: 0.0,
        };
        let lines = summary_lines(&summary, "USD");
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("1,520.54 USD"));
    }
}
