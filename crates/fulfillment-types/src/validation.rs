//! Configuration validation for pluggable implementations.
//!
//! Each storage backend, notification sink and batching strategy describes
//! the shape of its TOML table with a `Schema`. The builder validates the
//! table before handing it to the implementation's factory.

use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Debug, Error)]
pub enum ValidationError {
	/// Error that occurs when a required field is missing.
	#[error("Missing required field: {0}")]
	MissingField(String),
	/// Error that occurs when a field has an invalid value.
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	/// Error that occurs when field type is incorrect.
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
}

/// Represents the type of a configuration field.
#[derive(Debug)]
pub enum FieldType {
	/// A string value.
	String,
	/// A string restricted to a fixed set of values.
	OneOf(&'static [&'static str]),
	/// An integer value with optional inclusive bounds.
	Integer { min: Option<i64>, max: Option<i64> },
	/// A number; integers are accepted where floats are expected.
	Float { min: Option<f64>, max: Option<f64> },
}

/// Custom validation hook run after type checking.
pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

/// A named field in a configuration schema.
pub struct Field {
	pub name: String,
	pub field_type: FieldType,
	pub validator: Option<FieldValidator>,
}

impl std::fmt::Debug for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Field")
			.field("name", &self.name)
			.field("field_type", &self.field_type)
			.field("validator", &self.validator.is_some())
			.finish()
	}
}

impl Field {
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			validator: None,
		}
	}

	/// Adds a custom validator to this field.
	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}
}

/// Validation schema for one TOML table.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Validates a TOML value against this schema.
	///
	/// Checks presence of required fields, then the type and custom validator
	/// of every present field.
	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config
			.as_table()
			.ok_or_else(|| ValidationError::TypeMismatch {
				field: "root".to_string(),
				expected: "table".to_string(),
				actual: config.type_str().to_string(),
			})?;

		for field in &self.required {
			let value = table
				.get(&field.name)
				.ok_or_else(|| ValidationError::MissingField(field.name.clone()))?;
			check_field(field, value)?;
		}

		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				check_field(field, value)?;
			}
		}

		Ok(())
	}
}

fn check_field(field: &Field, value: &toml::Value) -> Result<(), ValidationError> {
	validate_field_type(&field.name, value, &field.field_type)?;
	if let Some(validator) = &field.validator {
		validator(value).map_err(|message| ValidationError::InvalidValue {
			field: field.name.clone(),
			message,
		})?;
	}
	Ok(())
}

fn mismatch(field_name: &str, expected: &str, value: &toml::Value) -> ValidationError {
	ValidationError::TypeMismatch {
		field: field_name.to_string(),
		expected: expected.to_string(),
		actual: value.type_str().to_string(),
	}
}

fn out_of_range<T: std::fmt::Display>(field_name: &str, value: T, bound: &str, limit: T) -> ValidationError {
	ValidationError::InvalidValue {
		field: field_name.to_string(),
		message: format!("Value {} is {} {}", value, bound, limit),
	}
}

fn validate_field_type(
	field_name: &str,
	value: &toml::Value,
	expected_type: &FieldType,
) -> Result<(), ValidationError> {
	match expected_type {
		FieldType::String => {
			if !value.is_str() {
				return Err(mismatch(field_name, "string", value));
			}
		},
		FieldType::OneOf(allowed) => {
			let s = value
				.as_str()
				.ok_or_else(|| mismatch(field_name, "string", value))?;
			if !allowed.contains(&s) {
				return Err(ValidationError::InvalidValue {
					field: field_name.to_string(),
					message: format!("'{}' is not one of {:?}", s, allowed),
				});
			}
		},
		FieldType::Integer { min, max } => {
			let int_val = value
				.as_integer()
				.ok_or_else(|| mismatch(field_name, "integer", value))?;
			if let Some(min_val) = min.filter(|m| int_val < *m) {
				return Err(out_of_range(field_name, int_val, "less than minimum", min_val));
			}
			if let Some(max_val) = max.filter(|m| int_val > *m) {
				return Err(out_of_range(field_name, int_val, "greater than maximum", max_val));
			}
		},
		FieldType::Float { min, max } => {
			let float_val = value
				.as_float()
				.or_else(|| value.as_integer().map(|i| i as f64))
				.ok_or_else(|| mismatch(field_name, "float", value))?;
			if let Some(min_val) = min.filter(|m| float_val < *m) {
				return Err(out_of_range(field_name, float_val, "less than minimum", min_val));
			}
			if let Some(max_val) = max.filter(|m| float_val > *m) {
				return Err(out_of_range(field_name, float_val, "greater than maximum", max_val));
			}
		},
	}

	Ok(())
}

/// A configuration schema that can validate TOML values.
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}
