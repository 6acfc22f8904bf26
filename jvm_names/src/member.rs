use anyhow::bail;
use crate::macros::{make_display, make_string_str_like};

make_string_str_like!(
	/// Represents a field name.
	pub FieldName(String);
	/// A [`FieldName`] slice.
	pub FieldNameSlice(str);
	is_valid(s) = if crate::names::is_valid_unqualified_name(s) {
		Ok(())
	} else {
		bail!("invalid field name: must be non-empty and not contain any of `.`, `;`, `[` and `/`");
	};
);
make_display!(FieldName, FieldNameSlice);

make_string_str_like!(
	/// Represents a method name.
	///
	/// Apart from `<init>` and `<clinit>`, a method name may not contain `<` or `>`.
	pub MethodName(String);
	/// A [`MethodName`] slice.
	pub MethodNameSlice(str);
	is_valid(s) = if crate::names::is_valid_method_name(s) {
		Ok(())
	} else {
		bail!("invalid method name: must be either `<init>`, `<clinit>` or be non-empty and not contain any of `.`, `;`, `[`, `/`, `<` and `>`");
	};
);
make_display!(MethodName, MethodNameSlice);

make_string_str_like!(
	/// Represents a parameter name.
	pub ParameterName(String);
	/// A [`ParameterName`] slice.
	pub ParameterNameSlice(str);
	is_valid(s) = if crate::names::is_valid_unqualified_name(s) {
		Ok(())
	} else {
		bail!("invalid parameter name: must be non-empty and not contain any of `.`, `;`, `[` and `/`");
	};
);
make_display!(ParameterName, ParameterNameSlice);

make_string_str_like!(
	/// Represents a local variable name.
	pub LocalVariableName(String);
	/// A [`LocalVariableName`] slice.
	pub LocalVariableNameSlice(str);
	is_valid(s) = if crate::names::is_valid_unqualified_name(s) {
		Ok(())
	} else {
		bail!("invalid local variable name: must be non-empty and not contain any of `.`, `;`, `[` and `/`");
	};
);
make_display!(LocalVariableName, LocalVariableNameSlice);
