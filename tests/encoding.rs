//! Type encoding integration tests.
//!
//! These tests check the SMT-LIB datatypes and parameter declarations that reach the path
//! documents, and that decoding a model recovers objects and their aliasing:
//! 1. Describe a method over class, array and collection parameters
//! 2. Compile it and inspect the rendered documents
//! 3. Decode scripted models for the object parameters

use std::sync::Arc;

use dotprobe::{form::AssertionGroup, prelude::*};

struct ScriptedSolver(String);

impl Solver for ScriptedSolver {
    fn check(&self, _document: &str) -> Result<SolverOutcome> {
        SolverOutcome::parse(&self.0)
    }
}

fn node_type() -> TypeDef {
    TypeDef::class(
        TypeName::new("Sample.Node"),
        vec![
            FieldDef::new("Value", RuntimeType::INT32),
            FieldDef::new("Next", RuntimeType::named("Sample.Node")),
        ],
    )
}

/// `static int First(Node a, Node b) { return a.Value; }`
fn first_value() -> Result<(MethodRef, InMemoryProvider)> {
    let node = RuntimeType::named("Sample.Node");
    let method = MethodRef::new_static(
        TypeName::new("Sample.Nodes"),
        "First",
        vec![node.clone(), node],
        Some(RuntimeType::INT32),
    );
    let mut builder = MethodBuilder::new(method.clone(), &["a", "b"]);
    let entry = builder.block();
    let a = builder.argument(0)?;
    let value = builder.temp("value", RuntimeType::INT32)?;
    builder.push(
        entry,
        Op::LoadField {
            dest: value,
            object: a,
            field: "Value".to_string(),
        },
    )?;
    builder.terminate(entry, Terminator::Return(Some(value)))?;

    let provider = InMemoryProvider::new();
    provider.add_type(node_type());
    provider.add_body(builder.build()?);
    Ok((method, provider))
}

/// `static int Size(List<int> items) { return items.Count; }`
fn list_count() -> Result<(MethodRef, MethodRef, InMemoryProvider)> {
    let list = TypeName::generic("System.Collections.Generic.List`1", vec![RuntimeType::INT32]);
    let count = MethodRef::new_instance(list.clone(), "get_Count", vec![], Some(RuntimeType::INT32));
    let method = MethodRef::new_static(
        TypeName::new("Sample.Lists"),
        "Size",
        vec![RuntimeType::Named(list)],
        Some(RuntimeType::INT32),
    );
    let mut builder = MethodBuilder::new(method.clone(), &["items"]);
    let entry = builder.block();
    let items = builder.argument(0)?;
    let size = builder.temp("size", RuntimeType::INT32)?;
    builder.push(
        entry,
        Op::Call {
            dest: Some(size),
            method: count.clone(),
            args: vec![items],
        },
    )?;
    builder.terminate(entry, Terminator::Return(Some(size)))?;

    let provider = InMemoryProvider::new();
    provider.add_body(builder.build()?);
    Ok((method, count, provider))
}

#[test]
fn test_datatypes_declared_once_in_dependency_order() -> Result<()> {
    let (method, provider) = first_value()?;
    let run = RunContext::new(Arc::new(provider), EngineConfig::default());
    let compiled = run.compile(&method)?;
    assert!(!compiled.paths.is_empty());

    for document in &compiled.paths {
        let text = document.text();
        assert_eq!(text.matches("(declare-datatypes ((Sample.Node 0))").count(), 1);
        assert_eq!(text.matches("(declare-datatypes ((Rtti 0))").count(), 1);
        assert_eq!(text.matches("(declare-datatypes ((System.Int32 0))").count(), 1);

        let rtti = text.find("((Rtti 0))").unwrap();
        let wrapper = text.find("((System.Int32 0))").unwrap();
        let node = text.find("((Sample.Node 0))").unwrap();
        assert!(rtti < node);
        assert!(wrapper < node);
    }
    Ok(())
}

#[test]
fn test_object_parameters_are_declared_with_their_sort() -> Result<()> {
    let (method, provider) = first_value()?;
    let run = RunContext::new(Arc::new(provider), EngineConfig::default());
    let compiled = run.compile(&method)?;

    let text = compiled.paths[0].text();
    assert!(text.contains("(declare-const a.0 Sample.Node)"));
    assert!(text.contains("(declare-const b.0 Sample.Node)"));
    assert!(text.contains("Sample.Node.null"));
    Ok(())
}

#[test]
fn test_field_read_has_null_path() -> Result<()> {
    let (method, provider) = first_value()?;
    let run = RunContext::new(Arc::new(provider), EngineConfig::default());
    let compiled = run.compile(&method)?;

    let groups: Vec<AssertionGroup> = compiled.paths.iter().map(PathDocument::group).collect();
    assert_eq!(
        groups,
        [
            AssertionGroup::normal(0),
            AssertionGroup::new(0, dotprobe::form::ExceptionGroup::SomethingBranch(0)),
        ]
    );
    Ok(())
}

#[test]
fn test_collection_parameter_is_an_array() -> Result<()> {
    let (method, count, provider) = list_count()?;
    let run = RunContext::new(Arc::new(provider), EngineConfig::default());
    let compiled = run.compile(&method)?;

    let text = compiled.paths[0].text();
    assert!(text.contains("(declare-const items.0 ArrayOf.System.Int32)"));
    assert!(text.contains("(declare-datatypes ((ArrayOf.System.Int32 0))"));
    assert!(matches!(
        compiled.form.encoding(&count.signature()),
        Some(dotprobe::formula::MethodEncoding::Accessor(
            dotprobe::formula::Accessor::Count
        ))
    ));
    Ok(())
}

#[test]
fn test_aliased_parameters_decode_to_one_object() -> Result<()> {
    let (method, provider) = first_value()?;
    let node = "(Sample.Node.new (- 1) (Rtti.new 1) (System.Int32.new 4) Sample.Node.null)";
    let response = format!(
        "sat\n(model (define-fun a.0 () Sample.Node {node}) (define-fun b.0 () Sample.Node {node}))\n"
    );
    let run = Arc::new(RunContext::new(
        Arc::new(provider),
        EngineConfig::default().with_parallel(false),
    ));
    let generator = Generator::new(run, Arc::new(ScriptedSolver(response)));

    let inputs = generator.interesting_inputs(&method)?;
    let group = AssertionGroup::normal(0);
    let a = inputs.get(group, 0).unwrap();
    let b = inputs.get(group, 1).unwrap();
    let (a, b) = (a.value.as_object().unwrap(), b.value.as_object().unwrap());
    assert!(Arc::ptr_eq(a, b));
    assert_eq!(a.pointer, -1);
    assert_eq!(a.field("Value").and_then(Value::as_i128), Some(4));
    assert!(a.field("Next").is_some_and(Value::is_null));
    Ok(())
}

#[test]
fn test_null_parameter_decodes_to_null() -> Result<()> {
    let (method, provider) = first_value()?;
    let response =
        "sat\n(model (define-fun a.0 () Sample.Node Sample.Node.null) (define-fun b.0 () Sample.Node Sample.Node.null))\n"
            .to_string();
    let run = Arc::new(RunContext::new(Arc::new(provider), EngineConfig::default()));
    let generator = Generator::new(run, Arc::new(ScriptedSolver(response)));

    let inputs = generator.interesting_inputs(&method)?;
    let raised = AssertionGroup::new(0, dotprobe::form::ExceptionGroup::SomethingBranch(0));
    let a = inputs.get(raised, 0).unwrap();
    assert!(a.value.is_null());
    assert_eq!(a.value.to_string(), "null");
    Ok(())
}
