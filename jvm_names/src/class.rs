use anyhow::{bail, Result};
use crate::macros::{make_display, make_string_str_like};

make_string_str_like!(
	/// A class name, in the internal form of the class file: packages are separated with `/`, inner classes
	/// with `$`.
	///
	/// ```
	/// use jvm_names::ClassName;
	/// assert!(ClassName::try_from("com/example/Foo$Bar").is_ok());
	/// assert!(ClassName::try_from("com.example.Foo").is_err());
	/// ```
	pub ClassName(String);
	/// A [`ClassName`] slice.
	pub ClassNameSlice(str);
	is_valid(s) = if crate::names::is_valid_class_name(s) {
		Ok(())
	} else {
		bail!("invalid class name: must consist of non-empty parts separated by `/`, none of them containing `.`, `;` or `[`")
	};
);
make_display!(ClassName, ClassNameSlice);

impl ClassName {
	/// Appends the name of an inner class to the name of its outer class.
	///
	/// ```
	/// use jvm_names::ClassName;
	///
	/// let outer = ClassName::try_from("com/example/Foo").unwrap();
	/// let inner = ClassName::try_from("Bar").unwrap();
	/// assert_eq!(ClassName::from_inner_class(outer, &inner), "com/example/Foo$Bar");
	/// ```
	pub fn from_inner_class(outer: ClassName, inner: &ClassNameSlice) -> ClassName {
		let mut s = outer.into_inner();
		s.push('$');
		s.push_str(inner.as_inner());
		// SAFETY: the last part of `outer` gets longer, and the parts of `inner` are valid on their own.
		unsafe { ClassName::from_inner_unchecked(s) }
	}

	/// Converts a name written like in java source code, like `java.lang.Object`, into a class name.
	///
	/// ```
	/// use jvm_names::ClassName;
	/// let name = ClassName::from_java_name("com.example.Foo$Bar").unwrap();
	/// assert_eq!(name, "com/example/Foo$Bar");
	/// ```
	pub fn from_java_name(java_name: &str) -> Result<ClassName> {
		ClassName::try_from(java_name.replace('.', "/"))
	}
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use crate::class::ClassName;

	#[test]
	fn inner_classes() -> Result<()> {
		let outer = ClassName::try_from("a")?;
		let inner = ClassName::try_from("b")?;
		let nested = ClassName::from_inner_class(ClassName::from_inner_class(outer, &inner), &inner);
		assert_eq!(nested, "a$b$b");
		Ok(())
	}

	#[test]
	fn java_names() -> Result<()> {
		assert_eq!(ClassName::from_java_name("net.minecraft.client.Minecraft")?, "net/minecraft/client/Minecraft");
		assert_eq!(ClassName::from_java_name("Foo")?, "Foo");
		assert!(ClassName::from_java_name("com..Foo").is_err());
		assert!(ClassName::from_java_name("int[]").is_err());
		Ok(())
	}
}
