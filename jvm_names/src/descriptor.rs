use std::iter::Peekable;
use std::str::Chars;
use anyhow::{anyhow, bail, Context, Result};
use crate::class::ClassName;
use crate::macros::{make_display, make_string_str_like};

make_string_str_like!(
	/// Represents a field descriptor, like `I` or `[Ljava/lang/String;`.
	pub FieldDescriptor(String);
	/// A [`FieldDescriptor`] slice.
	pub FieldDescriptorSlice(str);
	is_valid(s) = parse_field_descriptor(s).map(|_| ());
);
make_display!(FieldDescriptor, FieldDescriptorSlice);

make_string_str_like!(
	/// Represents a method descriptor, like `(ILjava/lang/String;)V`.
	pub MethodDescriptor(String);
	/// A [`MethodDescriptor`] slice.
	pub MethodDescriptorSlice(str);
	is_valid(s) = parse_method_descriptor(s).map(|_| ());
);
make_display!(MethodDescriptor, MethodDescriptorSlice);

/// A field type, as it appears in a descriptor. The variants are named after their descriptor characters.
///
/// ```
/// use jvm_names::descriptor::{ArrayType, Type};
///
/// // `long` and `long[][]`
/// assert_eq!(ArrayType::J.with_dimension(0), Type::J);
/// assert_eq!(ArrayType::J.with_dimension(2), Type::Array(2, ArrayType::J));
/// ```
///
/// An array always has a dimension of at least one, so that there's only one way of writing every type.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum Type {
	/// `byte`
	B,
	/// `char`
	C,
	/// `double`
	D,
	/// `float`
	F,
	/// `int`
	I,
	/// `long`
	J,
	/// `short`
	S,
	/// `boolean`
	Z,
	Object(ClassName),
	/// The dimension together with the element type.
	Array(u8, ArrayType),
}

/// The element type of an array.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum ArrayType {
	B,
	C,
	D,
	F,
	I,
	J,
	S,
	Z,
	Object(ClassName),
}

impl ArrayType {
	const PRIMITIVES: [(char, &'static str, ArrayType); 8] = [
		('B', "byte", ArrayType::B),
		('C', "char", ArrayType::C),
		('D', "double", ArrayType::D),
		('F', "float", ArrayType::F),
		('I', "int", ArrayType::I),
		('J', "long", ArrayType::J),
		('S', "short", ArrayType::S),
		('Z', "boolean", ArrayType::Z),
	];

	fn primitive(f: impl Fn(char, &str) -> bool) -> Option<ArrayType> {
		ArrayType::PRIMITIVES.into_iter()
			.find(|(char, name, _)| f(*char, name))
			.map(|(_, _, t)| t)
	}

	fn descriptor_char(&self) -> Option<char> {
		ArrayType::PRIMITIVES.iter()
			.find(|(_, _, t)| t == self)
			.map(|(char, _, _)| *char)
	}

	/// Turns this into a [`Type`], an array type if `dimension` isn't zero.
	pub fn with_dimension(self, dimension: u8) -> Type {
		if dimension != 0 {
			return Type::Array(dimension, self);
		}
		match self {
			ArrayType::B => Type::B,
			ArrayType::C => Type::C,
			ArrayType::D => Type::D,
			ArrayType::F => Type::F,
			ArrayType::I => Type::I,
			ArrayType::J => Type::J,
			ArrayType::S => Type::S,
			ArrayType::Z => Type::Z,
			ArrayType::Object(class_name) => Type::Object(class_name),
		}
	}
}

impl Type {
	/// Returns the class name referenced by this type, also looking into array types.
	pub fn class_name(&self) -> Option<&ClassName> {
		match self {
			Type::Object(class_name) | Type::Array(_, ArrayType::Object(class_name)) => Some(class_name),
			_ => None,
		}
	}

	/// Replaces the class name referenced by this type, keeping primitives and the array dimension.
	pub fn try_map_class<E>(self, f: &mut impl FnMut(ClassName) -> Result<ClassName, E>) -> Result<Type, E> {
		Ok(match self {
			Type::Object(class_name) => Type::Object(f(class_name)?),
			Type::Array(dimension, ArrayType::Object(class_name)) => Type::Array(dimension, ArrayType::Object(f(class_name)?)),
			other => other,
		})
	}

	/// Parses a java source style type name, as used by ProGuard, like `int`, `java.lang.String` or `long[][]`.
	///
	/// ```
	/// use jvm_names::descriptor::{ArrayType, Type};
	/// assert_eq!(Type::from_java_type_name("long[][]").unwrap(), Type::Array(2, ArrayType::J));
	/// assert_eq!(Type::from_java_type_name("byte").unwrap(), Type::B);
	/// assert!(Type::from_java_type_name("void").is_err());
	/// ```
	pub fn from_java_type_name(java_type_name: &str) -> Result<Type> {
		let mut rest = java_type_name.trim();
		let mut array_dimension: u8 = 0;
		while let Some(inner) = rest.strip_suffix("[]") {
			array_dimension = array_dimension.checked_add(1)
				.ok_or_else(|| anyhow!("array dimension of {java_type_name:?} is too large"))?;
			rest = inner.trim_end();
		}

		if rest == "void" {
			bail!("`void` is not a valid type for {java_type_name:?}");
		}
		let array_type = match ArrayType::primitive(|_, name| name == rest) {
			Some(primitive) => primitive,
			None => ArrayType::Object(ClassName::from_java_name(rest)
				.with_context(|| anyhow!("invalid class in java type name {java_type_name:?}"))?),
		};

		Ok(array_type.with_dimension(array_dimension))
	}
}

fn unexpected_end() -> anyhow::Error {
	anyhow!("unexpected abrupt ending of descriptor")
}

fn read_class_name(chars: &mut Peekable<Chars>) -> Result<ClassName> {
	let mut s = String::new();
	loop {
		match chars.next().ok_or_else(unexpected_end)? {
			';' => break,
			char => s.push(char),
		}
	}
	ClassName::try_from(s)
}

// The grammar for descriptors is:
//   FieldDescriptor:
//     FieldType
//
//   MethodDescriptor:
//     "(" FieldType* ")" ReturnDescriptor
//
//   ReturnDescriptor:
//     FieldType | "V"
//
//   FieldType:
//     "B" | "C" | "D" | "F" | "I" | "J" | "S" | "Z" |
//     "L" ClassName ";" |
//     "[" FieldType
fn read_field_type(chars: &mut Peekable<Chars>) -> Result<Type> {
	let mut array_dimension: u8 = 0;
	while chars.next_if_eq(&'[').is_some() {
		array_dimension = array_dimension.checked_add(1)
			.ok_or_else(|| anyhow!("array dimension too large"))?;
	}

	let array_type = match chars.next().ok_or_else(unexpected_end)? {
		'L' => ArrayType::Object(read_class_name(chars)?),
		c => ArrayType::primitive(|descriptor_char, _| descriptor_char == c)
			.with_context(|| anyhow!("unexpected char {c:?} in descriptor"))?,
	};

	Ok(array_type.with_dimension(array_dimension))
}

fn write_class_name(class_name: &ClassName, string: &mut String) {
	string.push('L');
	string.push_str(class_name.as_inner());
	string.push(';');
}

fn write_array_type(t: &ArrayType, string: &mut String) {
	match t {
		ArrayType::Object(class_name) => write_class_name(class_name, string),
		primitive => string.extend(primitive.descriptor_char()),
	}
}

fn write_field_type(t: &Type, string: &mut String) {
	match t {
		Type::Object(class_name) => write_class_name(class_name, string),
		Type::Array(dimension, element) => {
			string.extend(std::iter::repeat('[').take(usize::from(*dimension)));
			write_array_type(element, string);
		},
		Type::B => string.push('B'),
		Type::C => string.push('C'),
		Type::D => string.push('D'),
		Type::F => string.push('F'),
		Type::I => string.push('I'),
		Type::J => string.push('J'),
		Type::S => string.push('S'),
		Type::Z => string.push('Z'),
	}
}

fn parse_field_descriptor(s: &str) -> Result<ParsedFieldDescriptor> {
	let mut chars = s.chars().peekable();

	let descriptor = read_field_type(&mut chars)
		.with_context(|| anyhow!("failed to read field descriptor {s:?}"))?;

	if chars.peek().is_some() {
		bail!("expected end of field descriptor {s:?}, got {:?} remaining", String::from_iter(chars));
	}

	Ok(ParsedFieldDescriptor(descriptor))
}

fn parse_method_descriptor(s: &str) -> Result<ParsedMethodDescriptor> {
	let mut chars = s.chars().peekable();

	if chars.next_if_eq(&'(').is_none() {
		bail!("method descriptor {s:?} doesn't start with '('");
	}

	let mut parameter_descriptors = Vec::new();
	while chars.next_if_eq(&')').is_none() {
		let descriptor = read_field_type(&mut chars)
			.with_context(|| anyhow!("failed to read parameter descriptor of {s:?}"))?;
		parameter_descriptors.push(descriptor);
	}

	let return_descriptor = if chars.next_if_eq(&'V').is_some() {
		None
	} else {
		let descriptor = read_field_type(&mut chars)
			.with_context(|| anyhow!("failed to read return descriptor of {s:?}"))?;

		Some(descriptor)
	};

	if chars.peek().is_some() {
		bail!("expected end of method descriptor {s:?}, got {:?} remaining", String::from_iter(chars));
	}

	Ok(ParsedMethodDescriptor {
		parameter_descriptors,
		return_descriptor,
	})
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ParsedFieldDescriptor(pub Type);

impl FieldDescriptorSlice {
	/// Parses a field descriptor.
	///
	/// A field descriptor is defined by the [grammar](https://docs.oracle.com/javase/specs/jvms/se22/html/jvms-4.html#jvms-4.3.2) in the
	/// Java Virtual Machine Specification.
	///
	/// The inverse of this function is [`ParsedFieldDescriptor::write`].
	///
	/// # Examples
	/// ```
	/// # use pretty_assertions::assert_eq;
	/// use jvm_names::ClassName;
	/// use jvm_names::FieldDescriptor;
	/// use jvm_names::descriptor::{ArrayType, ParsedFieldDescriptor, Type};
	///
	/// assert_eq!(
	///     FieldDescriptor::try_from("Ljava/lang/Object;").unwrap().parse().unwrap(),
	///     ParsedFieldDescriptor(Type::Object(ClassName::try_from("java/lang/Object").unwrap()))
	/// );
	///
	/// let double_array = FieldDescriptor::try_from("[[[D").unwrap();
	/// assert_eq!(double_array.parse().unwrap(), ParsedFieldDescriptor(Type::Array(3, ArrayType::D)));
	/// assert_eq!(double_array, double_array.parse().unwrap().write());
	/// ```
	pub fn parse(&self) -> Result<ParsedFieldDescriptor> {
		parse_field_descriptor(self.as_inner())
	}
}

impl FieldDescriptor {
	/// Creates a field descriptor from a java source style type name, like `java.lang.String[]`.
	pub fn from_java_type_name(java_type_name: &str) -> Result<FieldDescriptor> {
		Ok(ParsedFieldDescriptor(Type::from_java_type_name(java_type_name)?).write())
	}
}

impl ParsedFieldDescriptor {
	/// Writes a field descriptor.
	///
	/// The inverse of this function is [`FieldDescriptorSlice::parse`].
	pub fn write(&self) -> FieldDescriptor {
		let mut s = String::new();
		write_field_type(&self.0, &mut s);
		// SAFETY: Writing a parsed descriptor always gives a valid descriptor.
		unsafe { FieldDescriptor::from_inner_unchecked(s) }
	}
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ParsedMethodDescriptor {
	pub parameter_descriptors: Vec<Type>,
	/// The return type, `None` for `void`.
	pub return_descriptor: Option<Type>,
}

impl MethodDescriptorSlice {
	/// Parses a method descriptor.
	///
	/// The inverse of this function is [`ParsedMethodDescriptor::write`].
	///
	/// ```
	/// use jvm_names::MethodDescriptor;
	/// use jvm_names::descriptor::Type;
	///
	/// let parsed = MethodDescriptor::try_from("(I[JLa/b;)V").unwrap().parse().unwrap();
	/// assert_eq!(parsed.parameter_descriptors.len(), 3);
	/// assert_eq!(parsed.parameter_descriptors[0], Type::I);
	/// assert_eq!(parsed.return_descriptor, None);
	/// ```
	pub fn parse(&self) -> Result<ParsedMethodDescriptor> {
		parse_method_descriptor(self.as_inner())
	}
}

impl MethodDescriptor {
	/// Creates a method descriptor from a java source style return type and a comma separated list of
	/// argument types, like ProGuard writes them.
	///
	/// ```
	/// use jvm_names::MethodDescriptor;
	/// let desc = MethodDescriptor::from_java_signature("void", "int,java.lang.String[]").unwrap();
	/// assert_eq!(desc, "(I[Ljava/lang/String;)V");
	/// ```
	pub fn from_java_signature(return_type: &str, arguments: &str) -> Result<MethodDescriptor> {
		let parameter_descriptors = arguments.split(',')
			.map(str::trim)
			.filter(|argument| !argument.is_empty())
			.map(Type::from_java_type_name)
			.collect::<Result<_>>()?;

		let return_descriptor = match return_type.trim() {
			"void" => None,
			return_type => Some(Type::from_java_type_name(return_type)?),
		};

		Ok(ParsedMethodDescriptor { parameter_descriptors, return_descriptor }.write())
	}
}

impl ParsedMethodDescriptor {
	pub fn write(&self) -> MethodDescriptor {
		let mut s = String::new();
		s.push('(');
		for parameter_descriptor in &self.parameter_descriptors {
			write_field_type(parameter_descriptor, &mut s);
		}
		s.push(')');
		if let Some(return_descriptor) = &self.return_descriptor {
			write_field_type(return_descriptor, &mut s);
		} else {
			s.push('V');
		}
		// SAFETY: Writing a parsed descriptor always gives a valid descriptor.
		unsafe { MethodDescriptor::from_inner_unchecked(s) }
	}

	/// Replaces every class name in the parameter and return types.
	pub fn try_map_classes<E>(self, f: &mut impl FnMut(ClassName) -> Result<ClassName, E>) -> Result<ParsedMethodDescriptor, E> {
		Ok(ParsedMethodDescriptor {
			parameter_descriptors: self.parameter_descriptors.into_iter()
				.map(|t| t.try_map_class(f))
				.collect::<Result<_, E>>()?,
			return_descriptor: self.return_descriptor
				.map(|t| t.try_map_class(f))
				.transpose()?,
		})
	}
}
