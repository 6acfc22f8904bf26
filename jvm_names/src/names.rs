//! Name validation, following JVMS 4.2.

const ILLEGAL_IN_UNQUALIFIED: [char; 4] = ['.', ';', '[', '/'];

/// An internal class name: one or more unqualified names joined by `/`.
///
/// Array classes never get a mapping of their own, so `[` is rejected like in any other unqualified name.
pub(crate) fn is_valid_class_name(name: &str) -> bool {
	name.split('/').all(is_valid_unqualified_name)
}

/// Field, parameter and local variable names.
pub(crate) fn is_valid_unqualified_name(name: &str) -> bool {
	!name.is_empty() && !name.contains(ILLEGAL_IN_UNQUALIFIED)
}

pub(crate) fn is_valid_method_name(name: &str) -> bool {
	match name {
		"<init>" | "<clinit>" => true,
		name => is_valid_unqualified_name(name) && !name.contains(['<', '>']),
	}
}

#[cfg(test)]
mod testing {
	use crate::names::{is_valid_class_name, is_valid_method_name, is_valid_unqualified_name};

	#[test]
	fn class_names() {
		for name in ["a", "class_1", "com/example/Foo", "com/example/Foo$Bar", "net/minecraft/unmapped/C_1234"] {
			assert!(is_valid_class_name(name), "{name:?} should be valid");
		}
		for name in ["", "/", "com/", "/com", "com//example", "com.example.Foo", "[Lcom/example/Foo;", "Foo;"] {
			assert!(!is_valid_class_name(name), "{name:?} should be invalid");
		}
	}

	#[test]
	fn unqualified_names() {
		for name in ["x", "field_1", "$VALUES", "this$0", "42"] {
			assert!(is_valid_unqualified_name(name), "{name:?} should be valid");
		}
		for name in ["", "a.b", "a;", "[", "java/lang"] {
			assert!(!is_valid_unqualified_name(name), "{name:?} should be invalid");
		}
	}

	#[test]
	fn method_names() {
		for name in ["<init>", "<clinit>", "method_3", "lambda$run$0"] {
			assert!(is_valid_method_name(name), "{name:?} should be valid");
		}
		for name in ["", "<init", "<main>", "a>b", "a/b"] {
			assert!(!is_valid_method_name(name), "{name:?} should be invalid");
		}
	}
}
