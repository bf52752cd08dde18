//! Resolution integration tests.
//!
//! These tests drive the unknown-resolution fixpoint through `RunContext::compile`:
//! 1. Describe methods referencing types and callees the provider does not know
//! 2. Compile them under different confirmation strategies
//! 3. Verify the chosen encodings, or the error reported on cancellation

use std::sync::{Arc, Mutex};

use dotprobe::{
    encoding::SentenceKind,
    formula::MethodEncoding,
    prelude::*,
    resolve::CallStack,
};

/// `static void Touch(Sample.Missing m) { }`
fn touch_missing() -> Result<(MethodRef, InMemoryProvider)> {
    let method = MethodRef::new_static(
        TypeName::new("Sample.Refs"),
        "Touch",
        vec![RuntimeType::named("Sample.Missing")],
        None,
    );
    let mut builder = MethodBuilder::new(method.clone(), &["m"]);
    let entry = builder.block();
    builder.terminate(entry, Terminator::Return(None))?;
    let provider = InMemoryProvider::new();
    provider.add_body(builder.build()?);
    Ok((method, provider))
}

/// `static int Mix(int x) { return Ext.Hash(x); }` with no body for `Ext.Hash`.
fn call_external() -> Result<(MethodRef, MethodRef, InMemoryProvider)> {
    let hash = MethodRef::new_static(
        TypeName::new("Sample.Ext"),
        "Hash",
        vec![RuntimeType::INT32],
        Some(RuntimeType::INT32),
    );
    let method = MethodRef::new_static(
        TypeName::new("Sample.Refs"),
        "Mix",
        vec![RuntimeType::INT32],
        Some(RuntimeType::INT32),
    );
    let mut builder = MethodBuilder::new(method.clone(), &["x"]);
    let entry = builder.block();
    let x = builder.argument(0)?;
    let h = builder.temp("h", RuntimeType::INT32)?;
    builder.push(
        entry,
        Op::Call {
            dest: Some(h),
            method: hash.clone(),
            args: vec![x],
        },
    )?;
    builder.terminate(entry, Terminator::Return(Some(h)))?;
    let provider = InMemoryProvider::new();
    provider.add_body(builder.build()?);
    Ok((method, hash, provider))
}

/// `static int Loop(int n) { return Loop(n); }`
fn self_recursive() -> Result<(MethodRef, InMemoryProvider)> {
    let method = MethodRef::new_static(
        TypeName::new("Sample.Refs"),
        "Loop",
        vec![RuntimeType::INT32],
        Some(RuntimeType::INT32),
    );
    let mut builder = MethodBuilder::new(method.clone(), &["n"]);
    let entry = builder.block();
    let n = builder.argument(0)?;
    let r = builder.temp("r", RuntimeType::INT32)?;
    builder.push(
        entry,
        Op::Call {
            dest: Some(r),
            method: method.clone(),
            args: vec![n],
        },
    )?;
    builder.terminate(entry, Terminator::Return(Some(r)))?;
    let provider = InMemoryProvider::new();
    provider.add_body(builder.build()?);
    Ok((method, provider))
}

/// `static int Name(int x)` chaining `x` through each of `callees` in turn.
fn relay(provider: &InMemoryProvider, name: &str, callees: &[&str]) -> Result<MethodRef> {
    let declaring = TypeName::new("Sample.Relay");
    let signature = |name: &str| {
        MethodRef::new_static(
            declaring.clone(),
            name,
            vec![RuntimeType::INT32],
            Some(RuntimeType::INT32),
        )
    };
    let method = signature(name);
    let mut builder = MethodBuilder::new(method.clone(), &["x"]);
    let entry = builder.block();
    let mut value = builder.argument(0)?;
    for (i, callee) in callees.iter().enumerate() {
        let dest = builder.temp(&format!("t{i}"), RuntimeType::INT32)?;
        builder.push(
            entry,
            Op::Call {
                dest: Some(dest),
                method: signature(callee),
                args: vec![value],
            },
        )?;
        value = dest;
    }
    builder.terminate(entry, Terminator::Return(Some(value)))?;
    provider.add_body(builder.build()?);
    Ok(method)
}

#[test]
fn test_missing_type_becomes_opaque() -> Result<()> {
    let (method, provider) = touch_missing()?;
    let run = RunContext::new(Arc::new(provider), EngineConfig::default());
    run.compile(&method)?;

    let sentence = run
        .sentences()
        .resolve(&RuntimeType::named("Sample.Missing"))
        .unwrap();
    assert!(matches!(sentence.kind(), SentenceKind::Opaque(_)));
    Ok(())
}

#[test]
fn test_cancelled_resolution_reports_pending_items() -> Result<()> {
    let (method, provider) = touch_missing()?;
    let run = RunContext::new(Arc::new(provider), EngineConfig::default())
        .with_resolve_way(Restricted::new(["collection-as-array"]));

    match run.compile(&method) {
        Err(Error::UnresolvedReference { kind, items }) => {
            assert_eq!(kind, UnknownKind::Type);
            assert_eq!(items, ["Sample.Missing"]);
        }
        other => panic!("expected an unresolved reference, got {other:?}"),
    }
    Ok(())
}

#[test]
fn test_offered_resolvers_shrink_after_failures() -> Result<()> {
    let (method, provider) = touch_missing()?;
    let offers: Arc<Mutex<Vec<Vec<String>>>> = Arc::default();
    let seen = offers.clone();
    let run = RunContext::new(Arc::new(provider), EngineConfig::default()).with_resolve_way(
        FnResolveWay(move |_: &Unknown, offered: &[&str]| {
            seen.lock()
                .unwrap()
                .push(offered.iter().map(ToString::to_string).collect());
            if offered.is_empty() {
                Decision::Cancel
            } else {
                Decision::Use(0)
            }
        }),
    );
    run.compile(&method)?;

    let offers = offers.lock().unwrap();
    assert_eq!(
        *offers,
        [
            vec!["collection-as-array".to_string(), "opaque-type".to_string()],
            vec!["opaque-type".to_string()],
        ]
    );
    Ok(())
}

#[test]
fn test_out_of_range_decision_is_rejected() -> Result<()> {
    let (method, provider) = touch_missing()?;
    let run = RunContext::new(Arc::new(provider), EngineConfig::default())
        .with_resolve_way(FnResolveWay(|_: &Unknown, _: &[&str]| Decision::Use(9)));

    assert!(matches!(run.compile(&method), Err(Error::InvalidIdentity(_))));
    Ok(())
}

#[test]
fn test_callee_without_body_is_uninterpreted() -> Result<()> {
    let (method, hash, provider) = call_external()?;
    let run = RunContext::new(Arc::new(provider), EngineConfig::default());
    let compiled = run.compile(&method)?;

    assert!(matches!(
        compiled.form.encoding(&hash.signature()),
        Some(MethodEncoding::Uninterpreted { .. })
    ));
    let text = compiled.paths[0].text();
    assert!(text.contains("(declare-fun |Sample.Ext::Hash(System.Int32)| (Int) Int)"));
    assert!(text.contains("(|Sample.Ext::Hash(System.Int32)| x.0)"));
    Ok(())
}

#[test]
fn test_restricted_way_cancels_method_resolution() -> Result<()> {
    let (method, _, provider) = call_external()?;
    let run = RunContext::new(Arc::new(provider), EngineConfig::default())
        .with_resolve_way(Restricted::new(["inline-callee"]));

    match run.compile(&method) {
        Err(Error::UnresolvedReference { kind, items }) => {
            assert_eq!(kind, UnknownKind::Method);
            assert_eq!(items, ["Sample.Ext::Hash(System.Int32)"]);
        }
        other => panic!("expected an unresolved reference, got {other:?}"),
    }
    Ok(())
}

#[test]
fn test_recursive_callee_is_not_inlined() -> Result<()> {
    let (method, provider) = self_recursive()?;
    let run = RunContext::new(Arc::new(provider), EngineConfig::default());
    let compiled = run.compile(&method)?;

    assert!(matches!(
        compiled.form.encoding(&method.signature()),
        Some(MethodEncoding::Uninterpreted { .. })
    ));
    Ok(())
}

#[test]
fn test_recursive_inlining_is_bounded_by_depth() -> Result<()> {
    let (method, provider) = self_recursive()?;
    let mut config = EngineConfig::default().with_max_call_depth(2);
    config.allow_recursive_inlining = true;
    let run = RunContext::new(Arc::new(provider), config);
    let compiled = run.compile(&method)?;

    assert!(matches!(
        compiled.form.encoding(&method.signature()),
        Some(MethodEncoding::Inline(_))
    ));
    assert!(compiled.paths[0].text().contains("cs0$n.0"));
    Ok(())
}

#[test]
fn test_unsupported_callee_body_fails_the_request() -> Result<()> {
    let declaring = TypeName::new("Sample.Refs");
    let flip = MethodRef::new_static(
        declaring.clone(),
        "Flip",
        vec![RuntimeType::BOOLEAN],
        Some(RuntimeType::BOOLEAN),
    );
    let method = MethodRef::new_static(
        declaring,
        "Twice",
        vec![RuntimeType::BOOLEAN],
        Some(RuntimeType::BOOLEAN),
    );

    let mut callee = MethodBuilder::new(flip.clone(), &["b"]);
    let entry = callee.block();
    let b = callee.argument(0)?;
    let negated = callee.temp("negated", RuntimeType::BOOLEAN)?;
    callee.push(entry, Op::Negate { dest: negated, src: b })?;
    callee.terminate(entry, Terminator::Return(Some(negated)))?;

    let mut caller = MethodBuilder::new(method.clone(), &["b"]);
    let entry = caller.block();
    let b = caller.argument(0)?;
    let r = caller.temp("r", RuntimeType::BOOLEAN)?;
    caller.push(
        entry,
        Op::Call {
            dest: Some(r),
            method: flip,
            args: vec![b],
        },
    )?;
    caller.terminate(entry, Terminator::Return(Some(r)))?;

    let provider = InMemoryProvider::new();
    provider.add_body(callee.build()?);
    provider.add_body(caller.build()?);
    let run = RunContext::new(Arc::new(provider), EngineConfig::default());

    assert!(matches!(
        run.compile(&method),
        Err(Error::UnsupportedConstruct { .. })
    ));
    Ok(())
}

#[test]
fn test_cached_callee_respects_the_call_stack() -> Result<()> {
    // A calls C then B, B and C both call D, D calls B
    let provider = InMemoryProvider::new();
    let a = relay(&provider, "A", &["C", "B"])?;
    let b = relay(&provider, "B", &["D"])?;
    let c = relay(&provider, "C", &["D"])?;
    let d = relay(&provider, "D", &["B"])?;
    let run = RunContext::new(Arc::new(provider), EngineConfig::default());
    run.compile(&a)?;

    let through_c = run.compile_in(&d, &CallStack::new().push(a.clone()).push(c))?;
    assert!(matches!(
        through_c.form.encoding(&b.signature()),
        Some(MethodEncoding::Inline(_))
    ));

    let through_b = run.compile_in(&d, &CallStack::new().push(a).push(b.clone()))?;
    assert!(matches!(
        through_b.form.encoding(&b.signature()),
        Some(MethodEncoding::Uninterpreted { .. })
    ));
    Ok(())
}
