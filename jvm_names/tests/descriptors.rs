use anyhow::Result;
use pretty_assertions::assert_eq;
use jvm_names::{ClassName, FieldDescriptor, MethodDescriptor};
use jvm_names::descriptor::{ArrayType, ParsedMethodDescriptor, Type};

#[test]
fn valid_field_descriptors() -> Result<()> {
	let valid_field_descriptors = [
		"B",
		"C",
		"D",
		"F",
		"I",
		"J",
		"Ljava/lang/Object;",
		"Lorg/example/MyClassName;",
		"Lorg/example/Outer$Inner;",
		"S",
		"Z",
		"[[[D",
		"[La;",
	];

	for i in valid_field_descriptors {
		assert!(FieldDescriptor::is_valid(i), "{:?} is a valid field desc", i);
	}

	Ok(())
}

#[test]
fn invalid_field_descriptors() -> Result<()> {
	let invalid_field_descriptors = [
		"",
		"V",
		"(",
		")",
		"()",
		"[V",
		"L;",
		"()V",
		"foo",
		"(D)I",
		"L;DV",
		"La.b;",
		"La",
	];

	for i in invalid_field_descriptors {
		assert!(!FieldDescriptor::is_valid(i), "{:?} is an invalid field desc", i);
	}

	Ok(())
}

#[test]
fn valid_method_descriptors() -> Result<()> {
	let valid_method_descriptors = [
		"()V",
		"(D)I",
		"(Ljava/lang/Object;)Ljava/lang/Object;",
		"([[IJLa;)[La;",
	];

	for i in valid_method_descriptors {
		assert!(MethodDescriptor::is_valid(i), "{:?} is a valid method desc", i);
	}

	Ok(())
}

#[test]
fn invalid_method_descriptors() -> Result<()> {
	let invalid_method_descriptors = [
		"",
		"V",
		"I",
		"(",
		"()",
		"(V)V",
		"()VV",
		"(L;)V",
		"(I",
	];

	for i in invalid_method_descriptors {
		assert!(!MethodDescriptor::is_valid(i), "{:?} is an invalid method desc", i);
	}

	Ok(())
}

#[test]
fn array_dimension_overflow() {
	let ok = "[".repeat(255) + "I";
	assert!(FieldDescriptor::is_valid(&ok));

	let too_deep = "[".repeat(256) + "I";
	assert!(!FieldDescriptor::is_valid(&too_deep));
}

#[test]
fn mapping_classes_keeps_primitives_and_dimensions() -> Result<()> {
	let desc = MethodDescriptor::try_from("(I[[La;Lb;)[La;")?;

	let mapped = desc.parse()?
		.try_map_classes(&mut |class: ClassName| -> Result<ClassName> {
			if class == "a" {
				ClassName::try_from("com/example/A")
			} else {
				Ok(class)
			}
		})?;

	assert_eq!(mapped.parameter_descriptors[0], Type::I);
	assert_eq!(mapped.parameter_descriptors[1], Type::Array(2, ArrayType::Object(ClassName::try_from("com/example/A")?)));
	assert_eq!(mapped.write(), "(I[[Lcom/example/A;Lb;)[Lcom/example/A;");
	Ok(())
}

#[test]
fn java_signatures() -> Result<()> {
	assert_eq!(MethodDescriptor::from_java_signature("void", "")?, "()V");
	assert_eq!(MethodDescriptor::from_java_signature("int[]", "long, double")?, "(JD)[I");
	assert_eq!(
		MethodDescriptor::from_java_signature("java.lang.String", "com.example.Foo$Bar[][]")?,
		"([[Lcom/example/Foo$Bar;)Ljava/lang/String;"
	);
	assert_eq!(FieldDescriptor::from_java_type_name("boolean")?, "Z");

	assert!(MethodDescriptor::from_java_signature("void", "void").is_err());

	let written = ParsedMethodDescriptor {
		parameter_descriptors: vec![Type::Z, Type::Object(ClassName::try_from("java/lang/Object")?)],
		return_descriptor: None,
	}.write();
	assert_eq!(written, "(ZLjava/lang/Object;)V");
	Ok(())
}
