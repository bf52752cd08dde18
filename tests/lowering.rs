//! Control-flow and heap lowering integration tests.
//!
//! These tests compile methods with joins, handlers and heap writes and check the path
//! structure the lowering produces:
//! 1. Describe the method with `MethodBuilder`
//! 2. Compile it and enumerate every assertion group, before and after the coverage filter
//! 3. Compare the assertion strings that decide each path

use std::sync::Arc;

use dotprobe::{
    form::{AssertionGroup, ExceptionGroup},
    paths,
    prelude::*,
};

fn raised(block: usize, ordinal: u32) -> AssertionGroup {
    AssertionGroup::new(block, ExceptionGroup::SomethingBranch(ordinal))
}

fn groups(documents: &[PathDocument]) -> Vec<AssertionGroup> {
    documents.iter().map(PathDocument::group).collect()
}

/// Every path of the form, including those the coverage filter drops.
fn all_paths(compiled: &CompiledForm) -> Result<Vec<PathDocument>> {
    paths::enumerate(&compiled.form, &compiled.rendered)
}

fn path(documents: &[PathDocument], group: AssertionGroup) -> &PathDocument {
    documents
        .iter()
        .find(|document| document.group() == group)
        .unwrap()
}

fn compile(method: &MethodRef, provider: InMemoryProvider) -> Result<Arc<CompiledForm>> {
    RunContext::new(Arc::new(provider), EngineConfig::default()).compile(method)
}

/// Pushes `dest = left < 0` and returns `dest`.
fn negative(builder: &mut MethodBuilder, block: usize, left: VarId, name: &str) -> Result<VarId> {
    let zero = builder.temp(&format!("{name}_zero"), RuntimeType::INT32)?;
    let dest = builder.temp(name, RuntimeType::BOOLEAN)?;
    builder.push(
        block,
        Op::Const {
            dest: zero,
            value: Literal::Int(PrimitiveKind::Int32, 0),
        },
    )?;
    builder.push(
        block,
        Op::Compare {
            dest,
            op: CompareOp::Lt,
            left,
            right: zero,
        },
    )?;
    Ok(dest)
}

/// `static int Abs(int x) { int r; if (x < 0) r = -x; else r = x; return r; }`
fn diamond() -> Result<(MethodRef, InMemoryProvider)> {
    let method = MethodRef::new_static(
        TypeName::new("Sample.Flow"),
        "Abs",
        vec![RuntimeType::INT32],
        Some(RuntimeType::INT32),
    );
    let mut builder = MethodBuilder::new(method.clone(), &["x"]);
    let entry = builder.block();
    let flip = builder.block();
    let keep = builder.block();
    let join = builder.block();
    let x = builder.argument(0)?;
    let c = negative(&mut builder, entry, x, "c")?;
    let n = builder.temp("n", RuntimeType::INT32)?;
    let r = builder.temp("r", RuntimeType::INT32)?;
    builder.terminate(
        entry,
        Terminator::Branch {
            condition: c,
            if_true: flip,
            if_false: keep,
        },
    )?;
    builder.push(flip, Op::Negate { dest: n, src: x })?;
    builder.terminate(flip, Terminator::Jump(join))?;
    builder.terminate(keep, Terminator::Jump(join))?;
    builder.push(
        join,
        Op::Phi {
            dest: r,
            operands: vec![(flip, n), (keep, x)],
        },
    )?;
    builder.terminate(join, Terminator::Return(Some(r)))?;

    let provider = InMemoryProvider::new();
    provider.add_body(builder.build()?);
    Ok((method, provider))
}

/// `if (x < 0) { if (y < 0) A else B } else C; join`, where `C` either returns or also
/// reaches the join.
fn nested(outer_reaches_join: bool) -> Result<(MethodRef, InMemoryProvider)> {
    let method = MethodRef::new_static(
        TypeName::new("Sample.Flow"),
        "Quadrant",
        vec![RuntimeType::INT32, RuntimeType::INT32],
        Some(RuntimeType::INT32),
    );
    let mut builder = MethodBuilder::new(method.clone(), &["x", "y"]);
    let entry = builder.block();
    let inner = builder.block();
    let left = builder.block();
    let right = builder.block();
    let outer = builder.block();
    let join = builder.block();
    let x = builder.argument(0)?;
    let y = builder.argument(1)?;
    let c = negative(&mut builder, entry, x, "c")?;
    builder.terminate(
        entry,
        Terminator::Branch {
            condition: c,
            if_true: inner,
            if_false: outer,
        },
    )?;
    let d = negative(&mut builder, inner, y, "d")?;
    builder.terminate(
        inner,
        Terminator::Branch {
            condition: d,
            if_true: left,
            if_false: right,
        },
    )?;
    builder.terminate(left, Terminator::Jump(join))?;
    builder.terminate(right, Terminator::Jump(join))?;
    if outer_reaches_join {
        builder.terminate(outer, Terminator::Jump(join))?;
    } else {
        builder.terminate(outer, Terminator::Return(Some(y)))?;
    }
    builder.terminate(join, Terminator::Return(Some(x)))?;

    let provider = InMemoryProvider::new();
    provider.add_body(builder.build()?);
    Ok((method, provider))
}

/// `static int SafeDiv(int a, int b) { try { return a / b; } catch { return 0; } }`
fn safe_div() -> Result<(MethodRef, InMemoryProvider)> {
    let method = MethodRef::new_static(
        TypeName::new("Sample.Flow"),
        "SafeDiv",
        vec![RuntimeType::INT32, RuntimeType::INT32],
        Some(RuntimeType::INT32),
    );
    let mut builder = MethodBuilder::new(method.clone(), &["a", "b"]);
    let body = builder.block();
    let handler = builder.block();
    let a = builder.argument(0)?;
    let b = builder.argument(1)?;
    let q = builder.temp("q", RuntimeType::INT32)?;
    let z = builder.temp("z", RuntimeType::INT32)?;
    builder.push(
        body,
        Op::Binary {
            dest: q,
            op: BinaryOp::Div,
            left: a,
            right: b,
        },
    )?;
    builder.terminate(body, Terminator::Return(Some(q)))?;
    builder.handler(body, handler)?;
    builder.push(
        handler,
        Op::Const {
            dest: z,
            value: Literal::Int(PrimitiveKind::Int32, 0),
        },
    )?;
    builder.terminate(handler, Terminator::Return(Some(z)))?;

    let provider = InMemoryProvider::new();
    provider.add_body(builder.build()?);
    Ok((method, provider))
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

#[test]
fn test_phi_is_a_disjunction_over_incoming_edges() -> Result<()> {
    let (method, provider) = diamond()?;
    let compiled = compile(&method, provider)?;

    assert_eq!(
        compiled.form.predecessors_of(AssertionGroup::normal(3)),
        [AssertionGroup::normal(1), AssertionGroup::normal(2)]
    );
    let all = all_paths(&compiled)?;
    let join = path(&all, AssertionGroup::normal(3));
    assert!(join.assertion_strings().is_empty());
    assert!(join.text().contains(
        "(assert (or (and c.0 (= r.0 n.0)) (and (not c.0) (= r.0 x.0)) \
         (and (not c.0) (not (not c.0)))))"
    ));

    assert_eq!(
        groups(&compiled.paths),
        [AssertionGroup::normal(1), AssertionGroup::normal(2)]
    );
    Ok(())
}

#[test]
fn test_complementary_join_keeps_the_common_prefix() -> Result<()> {
    let (method, provider) = nested(false)?;
    let compiled = compile(&method, provider)?;

    let all = all_paths(&compiled)?;
    assert_eq!(path(&all, AssertionGroup::normal(5)).assertion_strings(), ["(assert c.0)"]);
    assert_eq!(
        path(&all, AssertionGroup::normal(2)).assertion_strings(),
        ["(assert c.0)", "(assert d.0)"]
    );
    assert_eq!(
        path(&all, AssertionGroup::normal(3)).assertion_strings(),
        ["(assert c.0)", "(assert (not d.0))"]
    );

    assert_eq!(
        groups(&compiled.paths),
        [
            AssertionGroup::normal(2),
            AssertionGroup::normal(3),
            AssertionGroup::normal(4),
        ]
    );
    Ok(())
}

#[test]
fn test_uneven_join_asserts_a_merge() -> Result<()> {
    let (method, provider) = nested(true)?;
    let compiled = compile(&method, provider)?;

    assert_eq!(
        compiled.form.predecessors_of(AssertionGroup::normal(5)),
        [
            AssertionGroup::normal(2),
            AssertionGroup::normal(3),
            AssertionGroup::normal(4),
        ]
    );
    assert_eq!(
        groups(&compiled.paths),
        [
            AssertionGroup::normal(2),
            AssertionGroup::normal(3),
            AssertionGroup::normal(4),
            AssertionGroup::normal(5),
        ]
    );
    let join = path(&compiled.paths, AssertionGroup::normal(5));
    assert_eq!(
        join.assertion_strings(),
        ["(assert (or (and c.0 d.0) (and c.0 (not d.0)) (not c.0)))"]
    );
    Ok(())
}

#[test]
fn test_division_raises_into_handler() -> Result<()> {
    let (method, provider) = safe_div()?;
    let compiled = compile(&method, provider)?;

    let nonzero = "(not (= b.0 0))";
    let no_overflow = "(not (and (= a.0 (- 2147483648)) (= b.0 (- 1))))";
    assert_eq!(
        compiled.form.predecessors_of(AssertionGroup::normal(1)),
        [raised(0, 0), raised(0, 1)]
    );
    assert_eq!(
        groups(&compiled.paths),
        [
            AssertionGroup::normal(0),
            raised(0, 0),
            raised(0, 1),
            AssertionGroup::normal(1),
        ]
    );

    let completes = path(&compiled.paths, AssertionGroup::normal(0));
    assert_eq!(
        completes.assertion_strings(),
        [
            format!("(assert {nonzero})"),
            format!("(assert (=> {nonzero} {no_overflow}))"),
        ]
    );
    assert_eq!(
        path(&compiled.paths, raised(0, 0)).assertion_strings(),
        ["(assert (not (not (= b.0 0))))"]
    );
    assert_eq!(
        path(&compiled.paths, raised(0, 1)).assertion_strings(),
        [
            format!("(assert {nonzero})"),
            format!("(assert (not {no_overflow}))"),
        ]
    );

    let caught = path(&compiled.paths, AssertionGroup::normal(1));
    assert_eq!(
        caught.assertion_strings(),
        [format!(
            "(assert (or (not {nonzero}) (and {nonzero} (not {no_overflow}))))"
        )]
    );
    assert!(caught.text().contains("(assert (= z.0 0))"));
    Ok(())
}

#[test]
fn test_unsigned_division_cannot_overflow() -> Result<()> {
    let uint = RuntimeType::Primitive(PrimitiveKind::UInt32);
    let method = MethodRef::new_static(
        TypeName::new("Sample.Flow"),
        "Quotient",
        vec![uint.clone(), uint.clone()],
        Some(uint.clone()),
    );
    let mut builder = MethodBuilder::new(method.clone(), &["a", "b"]);
    let entry = builder.block();
    let a = builder.argument(0)?;
    let b = builder.argument(1)?;
    let q = builder.temp("q", uint)?;
    builder.push(
        entry,
        Op::Binary {
            dest: q,
            op: BinaryOp::Rem,
            left: a,
            right: b,
        },
    )?;
    builder.terminate(entry, Terminator::Return(Some(q)))?;
    let provider = InMemoryProvider::new();
    provider.add_body(builder.build()?);

    let compiled = compile(&method, provider)?;
    assert_eq!(
        groups(&compiled.paths),
        [AssertionGroup::normal(0), raised(0, 0)]
    );
    Ok(())
}

#[test]
fn test_thrown_exception_reaches_handler() -> Result<()> {
    let failure = TypeName::new("Sample.Failure");
    let method = MethodRef::new_static(
        TypeName::new("Sample.Flow"),
        "Check",
        vec![RuntimeType::INT32],
        None,
    );
    let mut builder = MethodBuilder::new(method.clone(), &["x"]);
    let entry = builder.block();
    let throws = builder.block();
    let fine = builder.block();
    let handler = builder.block();
    let x = builder.argument(0)?;
    let c = negative(&mut builder, entry, x, "c")?;
    let error = builder.temp("error", RuntimeType::Named(failure.clone()))?;
    builder.terminate(
        entry,
        Terminator::Branch {
            condition: c,
            if_true: throws,
            if_false: fine,
        },
    )?;
    builder.push(
        throws,
        Op::NewObject {
            dest: error,
            ty: failure.clone(),
        },
    )?;
    builder.terminate(throws, Terminator::Throw(error))?;
    builder.handler(throws, handler)?;
    builder.terminate(fine, Terminator::Return(None))?;
    builder.terminate(handler, Terminator::Return(None))?;

    let provider = InMemoryProvider::new();
    provider.add_type(TypeDef::class(failure, vec![]));
    provider.add_body(builder.build()?);
    let compiled = compile(&method, provider)?;

    assert_eq!(
        compiled.form.predecessors_of(AssertionGroup::normal(3)),
        [AssertionGroup::normal(1)]
    );
    assert_eq!(
        groups(&compiled.paths),
        [AssertionGroup::normal(2), AssertionGroup::normal(3)]
    );
    let caught = path(&compiled.paths, AssertionGroup::normal(3));
    assert_eq!(caught.assertion_strings(), ["(assert c.0)"]);
    assert!(caught.text().contains("(declare-const error.0 Sample.Failure)"));
    Ok(())
}

#[test]
fn test_field_store_guards_are_implications() -> Result<()> {
    let node = TypeName::new("Sample.Node");
    let method = MethodRef::new_static(
        TypeName::new("Sample.Nodes"),
        "Fresh",
        vec![RuntimeType::INT32],
        Some(RuntimeType::INT32),
    );
    let mut builder = MethodBuilder::new(method.clone(), &["v"]);
    let entry = builder.block();
    let v = builder.argument(0)?;
    let n = builder.temp("n", RuntimeType::Named(node.clone()))?;
    let r = builder.temp("r", RuntimeType::INT32)?;
    builder.push(entry, Op::NewObject { dest: n, ty: node })?;
    builder.push(
        entry,
        Op::StoreField {
            object: n,
            field: "Value".to_string(),
            value: v,
        },
    )?;
    builder.push(
        entry,
        Op::LoadField {
            dest: r,
            object: n,
            field: "Value".to_string(),
        },
    )?;
    builder.terminate(entry, Terminator::Return(Some(r)))?;

    let provider = InMemoryProvider::new();
    provider.add_type(node_type());
    provider.add_body(builder.build()?);
    let compiled = compile(&method, provider)?;

    assert_eq!(
        groups(&compiled.paths),
        [AssertionGroup::normal(0), raised(0, 0), raised(0, 1)]
    );
    let before = "(not ((_ is Sample.Node.null) n.0))";
    let after = "(not ((_ is Sample.Node.null) n.1))";
    let completes = path(&compiled.paths, AssertionGroup::normal(0));
    assert_eq!(
        completes.assertion_strings(),
        [
            format!("(assert {before})"),
            format!("(assert (=> {before} {after}))"),
        ]
    );

    let text = completes.text();
    assert!(text.contains("(declare-const n.0 Sample.Node)"));
    assert!(text.contains("(declare-const n.1 Sample.Node)"));
    assert!(text.contains("(assert (= n.0 (Sample.Node.new "));
    assert!(text.contains("(assert (= n.1 (Sample.Node.new "));
    assert!(text.contains("(System.Int32.new v.0)"));
    Ok(())
}

#[test]
fn test_array_allocation_and_store() -> Result<()> {
    let array = RuntimeType::array_of(RuntimeType::INT32);
    let method = MethodRef::new_static(
        TypeName::new("Sample.Arrays"),
        "Fill",
        vec![RuntimeType::INT32, RuntimeType::INT32],
        Some(array.clone()),
    );
    let mut builder = MethodBuilder::new(method.clone(), &["len", "v"]);
    let entry = builder.block();
    let len = builder.argument(0)?;
    let v = builder.argument(1)?;
    let zero = builder.temp("zero", RuntimeType::INT32)?;
    let a = builder.temp("a", array)?;
    builder.push(
        entry,
        Op::Const {
            dest: zero,
            value: Literal::Int(PrimitiveKind::Int32, 0),
        },
    )?;
    builder.push(
        entry,
        Op::NewArray {
            dest: a,
            element: RuntimeType::INT32,
            length: len,
        },
    )?;
    builder.push(
        entry,
        Op::StoreElement {
            array: a,
            index: zero,
            value: v,
        },
    )?;
    builder.terminate(entry, Terminator::Return(Some(a)))?;

    let provider = InMemoryProvider::new();
    provider.add_body(builder.build()?);
    let compiled = compile(&method, provider)?;

    assert_eq!(
        groups(&compiled.paths),
        [
            AssertionGroup::normal(0),
            raised(0, 0),
            raised(0, 1),
            raised(0, 2),
        ]
    );
    assert_eq!(
        path(&compiled.paths, raised(0, 0)).assertion_strings(),
        ["(assert (not (<= 0 len.0)))"]
    );
    let completes = path(&compiled.paths, AssertionGroup::normal(0));
    let strings = completes.assertion_strings();
    assert_eq!(strings.len(), 3);
    assert_eq!(strings[0], "(assert (<= 0 len.0))");
    let out_of_bounds = path(&compiled.paths, raised(0, 2)).assertion_strings();
    assert_eq!(out_of_bounds[..2], strings[..2]);
    assert_ne!(out_of_bounds[2], strings[2]);

    let text = completes.text();
    assert!(text.contains("(declare-const a.0 ArrayOf.System.Int32)"));
    assert!(text.contains("(declare-const a.1 ArrayOf.System.Int32)"));
    Ok(())
}
