//! CSV rendering of a chain's transaction log.

use chrono::SecondsFormat;
use txrelay_types::ChainReport;

const HEADER: &str = "Timestamp,Type,ID,Hash,Status,Gas Spent,Retries,Error";

/// Quotes a field that contains a separator, a quote or a line break.
fn escape(field: &str) -> String {
	if field.contains([',', '"', '\n', '\r']) {
		format!("\"{}\"", field.replace('"', "\"\""))
	} else {
		field.to_string()
	}
}

pub(super) fn render(report: &ChainReport) -> String {
	let mut out = String::from(HEADER);
	out.push('\n');

	for tx in &report.transactions {
		let fields = [
			tx.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
			tx.tx_type.to_string(),
			tx.id.clone(),
			tx.hash.clone(),
			tx.status.to_string(),
			tx.gas_spent.to_string(),
			tx.retries.to_string(),
			tx.error_message.clone().unwrap_or_default(),
		];
		let row: Vec<String> = fields.iter().map(|field| escape(field)).collect();
		out.push_str(&row.join(","));
		out.push('\n');
	}

	out
}
