use anyhow::Result;
use pretty_assertions::assert_eq;
use jvm_names::{ClassName, MethodDescriptor, MethodName};
use mapping_tree::{tiny_v1, tiny_v2, MappingError};
use mapping_tree::select::Selection;
use mapping_tree::tree::builder::MappingTreeBuilder;
use mapping_tree::tree::mappings::{MappingTree, Order};
use mapping_tree::tree::names::Namespaces;
use mapping_tree::visitor::{MappingVisitor, StreamChecker};

fn read_tiny_v2(input: &str) -> Result<MappingTree> {
	let mut checker = StreamChecker::new(MappingTreeBuilder::default());
	tiny_v2::read(input.as_bytes(), &mut checker)?;
	checker.finish()?.finish()
}

const OBF_NAMED: &str = "\
tiny	2	0	obf	named
c	a	com/example/Foo
	m	()V	m	doWork
";

const FULL: &str = "\
tiny	2	0	official	intermediary	named
c	a	class_1	com/example/Foo
	c	The main class.\\nWith two lines.
	f	I	a	field_1	count
	f	[Lb;	b	field_2\t
	m	(La;J)Lb;	c	method_3	combine
		c	Combines them.
		p	1			other
			c	The other one.
		p	3	x	\t
		v	4	12	0			result
c	b	class_2\t
c	c		com/example/Bar
";

#[test]
fn tiny_v2_round_trip() -> Result<()> {
	let tree = read_tiny_v2(FULL)?;
	let written = tiny_v2::write_string(&tree, Order::Insertion)?;
	assert_eq!(written, FULL);

	let again = read_tiny_v2(&written)?;
	assert_eq!(tiny_v2::write_string(&again, Order::Insertion)?, FULL);
	Ok(())
}

#[test]
fn tiny_v2_streaming_round_trip() -> Result<()> {
	let mut output = Vec::new();
	let mut checker = StreamChecker::new(tiny_v2::TinyV2Writer::new(&mut output));
	tiny_v2::read(FULL.as_bytes(), &mut checker)?;
	checker.finish()?;

	assert_eq!(String::from_utf8(output)?, FULL);
	Ok(())
}

#[test]
fn tiny_v1_round_trip() -> Result<()> {
	let input = "\
v1	official	intermediary	named
CLASS	a	class_1	com/example/Foo
FIELD	a	I	a	field_1	count
METHOD	a	(La;J)Lb;	c	method_3	combine
CLASS	b	class_2\t
";
	let mut checker = StreamChecker::new(MappingTreeBuilder::default());
	tiny_v1::read(input.as_bytes(), &mut checker)?;
	let tree = checker.finish()?.finish()?;

	assert_eq!(tiny_v1::write_string(&tree, Order::Insertion)?, input);
	Ok(())
}

#[test]
fn tiny_v2_to_tiny_v1_drops_what_tiny_v1_cannot_hold() -> Result<()> {
	let tree = read_tiny_v2(FULL)?;

	let expected = "\
v1	official	intermediary	named
CLASS	a	class_1	com/example/Foo
FIELD	a	I	a	field_1	count
FIELD	a	[Lb;	b	field_2\t
METHOD	a	(La;J)Lb;	c	method_3	combine
CLASS	b	class_2\t
CLASS	c		com/example/Bar
";
	assert_eq!(tiny_v1::write_string(&tree, Order::Insertion)?, expected);
	Ok(())
}

#[test]
fn select_same_namespaces() -> Result<()> {
	let tree = read_tiny_v2(OBF_NAMED)?;

	let selection = Selection {
		namespaces: vec!["obf".to_owned(), "named".to_owned()],
		..Selection::default()
	};
	let selected = tree.select(&selection)?;

	assert_eq!(tiny_v2::write_string(&selected, Order::Insertion)?, OBF_NAMED);
	Ok(())
}

#[test]
fn select_missing_namespace_with_fallback() -> Result<()> {
	let tree = read_tiny_v2(OBF_NAMED)?;

	let selection = Selection {
		namespaces: vec!["missing".to_owned()],
		fallback: vec!["named".to_owned(), "obf".to_owned()],
		..Selection::default()
	};
	let selected = tree.select(&selection)?;

	let expected = "\
tiny	2	0	missing
c	com/example/Foo
	m	()V	doWork
";
	assert_eq!(tiny_v2::write_string(&selected, Order::Insertion)?, expected);
	Ok(())
}

#[test]
fn select_swapped_namespaces_remaps_descriptors() -> Result<()> {
	let tree = read_tiny_v2(FULL)?;

	let selection = Selection {
		namespaces: vec!["named".to_owned(), "official".to_owned()],
		fallback: vec!["intermediary".to_owned()],
		..Selection::default()
	};
	let selected = tree.select(&selection)?;

	let foo = selected.get_class(&ClassName::try_from("com/example/Foo")?).unwrap();
	let combine = foo.get_method("combine", "(Lcom/example/Foo;J)Lclass_2;").unwrap();
	assert_eq!(combine.javadoc.as_ref().unwrap().0, "Combines them.");

	// every element has a name in the primary namespace
	for class in selected.classes() {
		assert!(class.info.names.names().names()[0].is_some());
		for method in class.methods.values() {
			assert!(method.info.names.names().names()[0].is_some());
		}
	}
	assert!(selected.get_class(&ClassName::try_from("class_2")?).is_some());
	assert!(selected.get_class(&ClassName::try_from("com/example/Bar")?).is_some());
	Ok(())
}

#[test]
fn method_before_class_is_malformed() -> Result<()> {
	let mut output = Vec::new();
	let mut checker = StreamChecker::new(tiny_v2::TinyV2Writer::new(&mut output));
	checker.visit_namespaces(&Namespaces::try_from(&["obf", "named"][..])?)?;

	let error = checker.visit_method(&MethodName::try_from("m")?, &MethodDescriptor::try_from("()V")?).unwrap_err();
	assert!(matches!(MappingError::find(&error), Some(MappingError::MalformedStream(_))));
	Ok(())
}
