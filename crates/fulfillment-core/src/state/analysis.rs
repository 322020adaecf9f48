//! Rule-based classification of order exceptions.
//!
//! Intake errors are matched by keyword, first match wins:
//! contact details, then address, then payment, then duplicates.

use fulfillment_types::{ExceptionAnalysis, ExceptionCategory, ExceptionPriority};

struct Rule {
	keywords: &'static [&'static str],
	category: ExceptionCategory,
	priority: ExceptionPriority,
	root_cause: &'static str,
	steps: [&'static str; 3],
	customer_message: &'static str,
}

const RULES: [Rule; 4] = [
	Rule {
		keywords: &["email", "phone"],
		category: ExceptionCategory::Data,
		priority: ExceptionPriority::Medium,
		root_cause: "Customer contact information is invalid or missing",
		steps: [
			"Verify email address format",
			"Contact customer via alternate method",
			"Update customer information",
		],
		customer_message: "We need to verify your contact information to process your order.",
	},
	Rule {
		keywords: &["address", "zip"],
		category: ExceptionCategory::Address,
		priority: ExceptionPriority::High,
		root_cause: "Shipping address is incomplete or invalid",
		steps: [
			"Verify address with postal database",
			"Contact customer for clarification",
			"Update address in system",
		],
		customer_message:
			"We need to confirm your shipping address to ensure successful delivery.",
	},
	Rule {
		keywords: &["payment"],
		category: ExceptionCategory::Payment,
		priority: ExceptionPriority::High,
		root_cause: "Payment processing failed",
		steps: [
			"Contact customer for alternate payment method",
			"Retry payment processing",
			"Update payment information",
		],
		customer_message: "We encountered an issue processing your payment. Please provide an alternate payment method.",
	},
	Rule {
		keywords: &["duplicate"],
		category: ExceptionCategory::Other,
		priority: ExceptionPriority::Medium,
		root_cause: "Potential duplicate order detected",
		steps: [
			"Review order history",
			"Contact customer to confirm",
			"Cancel duplicate if confirmed",
		],
		customer_message: "We noticed a similar order was recently placed. Please confirm if this is a new order.",
	},
];

const FALLBACK: Rule = Rule {
	keywords: &[],
	category: ExceptionCategory::Other,
	priority: ExceptionPriority::Low,
	root_cause: "Order validation failed",
	steps: [
		"Review all order details",
		"Contact customer for missing information",
		"Manually correct and revalidate",
	],
	customer_message: "We need additional information to process your order.",
};

/// Classifies an exception from the intake errors recorded on the order.
pub fn analyze_errors(errors: &[String], analyzed_at: u64) -> ExceptionAnalysis {
	let text = errors.join(" ").to_lowercase();
	let rule = RULES
		.iter()
		.find(|rule| rule.keywords.iter().any(|k| text.contains(k)))
		.unwrap_or(&FALLBACK);

	ExceptionAnalysis {
		category: rule.category,
		priority: rule.priority,
		root_cause: rule.root_cause.to_string(),
		resolution_steps: rule.steps.iter().map(|s| s.to_string()).collect(),
		suggested_action: rule.steps[0].to_string(),
		customer_message: rule.customer_message.to_string(),
		analyzed_at,
	}
}
