// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::Result;
use polix::*;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

fn doc(json: &str) -> Result<Value> {
    Value::from_json_str(json)
}

fn policies(texts: &[&str]) -> Result<Vec<Node>> {
    Ok(texts.iter().map(|t| parse_str(t)).collect::<Result<Vec<_>, _>>()?)
}

fn even(v: &Value, _: &Value) -> bool {
    v.as_number()
        .ok()
        .and_then(|n| n.as_i64())
        .map_or(false, |n| n % 2 == 0)
}

fn options() -> CompileOptions {
    CompileOptions::new().with_specializer(Arc::new(InlineSpecializer))
}

#[test]
fn tier_selection() -> Result<()> {
    let registry = Arc::new(OperatorRegistry::with_builtins());
    registry.register("even", even)?;
    let compiler = Compiler::new(registry);

    let simple = policies(&[r#"[:= [:role] "admin"]"#, "[:> [:level] 2]"])?;
    let custom = policies(&["[:even [:n] nil]"])?;
    let complex = policies(&["[:forall [:xs] [:= [:a] 1]]"])?;

    assert_eq!(compiler.compile(&simple, options())?.tier(), Tier::T3);
    assert_eq!(compiler.compile(&simple, CompileOptions::new())?.tier(), Tier::T2);
    assert_eq!(compiler.compile(&simple, options().with_tier(Tier::T2))?.tier(), Tier::T2);
    assert_eq!(compiler.compile(&simple, options().with_tier(Tier::T1))?.tier(), Tier::T1);
    assert_eq!(compiler.compile(&simple, options().with_tier(Tier::T0))?.tier(), Tier::T0);
    assert_eq!(compiler.compile(&custom, options())?.tier(), Tier::T1);
    assert_eq!(compiler.compile(&custom, options().with_tier(Tier::T0))?.tier(), Tier::T0);
    assert_eq!(compiler.compile(&complex, options())?.tier(), Tier::T0);
    Ok(())
}

#[test]
fn guarded_policy_falls_back_after_registration() -> Result<()> {
    let registry = Arc::new(OperatorRegistry::with_builtins());
    registry.register("even", even)?;
    let policy = Compiler::new(registry.clone()).compile(&policies(&["[:even [:n] nil]"])?, options())?;
    assert_eq!(policy.tier(), Tier::T1);
    assert_eq!(policy.compiled_version(), registry.current_version());

    let four = doc(r#"{"n": 4}"#)?;
    assert!(policy.evaluate(&four)?.is_satisfied());

    // Redefine the operator; the compiled closure still holds the old one.
    registry.register("even", |v, _| !even(v, &Value::Null))?;
    assert!(policy.is_stale());
    assert!(policy.evaluate(&four)?.is_conflict());

    let refreshed = policy.refresh()?;
    assert!(!refreshed.is_stale());
    assert_eq!(refreshed.compiled_version(), registry.current_version());
    assert!(refreshed.evaluate(&four)?.is_conflict());
    // The original value is unchanged.
    assert!(policy.is_stale());
    Ok(())
}

#[test]
fn unrelated_registration_also_trips_the_guard() -> Result<()> {
    let registry = Arc::new(OperatorRegistry::with_builtins());
    registry.register("even", even)?;
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = calls.clone();
    let fallback = Arc::new(move |_: &Value| -> Result<Residual, UnknownOperator> {
        counted.fetch_add(1, Ordering::SeqCst);
        Ok(Residual::Satisfied)
    });

    let policy = Compiler::new(registry.clone()).compile(
        &policies(&["[:even [:n] nil]"])?,
        options().with_fallback(Arc::new(FnEvaluator(fallback))),
    )?;
    let three = doc(r#"{"n": 3}"#)?;
    assert!(policy.evaluate(&three)?.is_conflict());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    registry.register("odd", |_, _| true)?;
    assert!(policy.evaluate(&three)?.is_satisfied());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    Ok(())
}

struct FnEvaluator<F>(Arc<F>);

impl<F> Evaluator for FnEvaluator<F>
where
    F: Fn(&Value) -> Result<Residual, UnknownOperator> + Send + Sync,
{
    fn evaluate(&self, document: &Value) -> Result<Residual, UnknownOperator> {
        (self.0)(document)
    }
}

#[test]
fn builtin_only_policies_ignore_registrations() -> Result<()> {
    let registry = Arc::new(OperatorRegistry::with_builtins());
    let policy = Compiler::new(registry.clone()).compile(&policies(&["[:in [:env] [\"prod\"]]"])?, options())?;
    registry.register("whatever", |_, _| false)?;
    assert!(!policy.is_stale());
    assert!(policy.evaluate(&doc(r#"{"env": "prod"}"#)?)?.is_satisfied());
    Ok(())
}

#[test]
fn missing_fallback() -> Result<()> {
    let registry = Arc::new(OperatorRegistry::with_builtins());
    registry.register("even", even)?;
    let compiler = Compiler::new(registry);

    let custom = policies(&["[:and [:even [:n] nil] [:= [:m] 1]]"])?;
    match compiler.compile(&custom, options().without_fallback()) {
        Err(CompileError::MissingFallback { operators }) => {
            assert_eq!(operators, vec![OperatorId::from("even")])
        }
        r => panic!("unexpected {r:?}"),
    }

    // Built-in operators never need one.
    let builtin = policies(&["[:= [:m] 1]"])?;
    let policy = compiler.compile(&builtin, options().without_fallback())?;
    assert_eq!(policy.tier(), Tier::T3);
    assert!(policy.fallback().is_none());
    Ok(())
}

#[test]
fn unknown_operator_fails_compilation() -> Result<()> {
    let compiler = Compiler::new(Arc::new(OperatorRegistry::with_builtins()));
    match compiler.compile(&policies(&["[:frobnicate [:a] 1]"])?, options()) {
        Err(CompileError::UnknownOperator(UnknownOperator(id))) => {
            assert_eq!(id.as_ref(), "frobnicate")
        }
        r => panic!("unexpected {r:?}"),
    }
    Ok(())
}

#[test]
fn every_tier_agrees() -> Result<()> {
    let registry = Arc::new(OperatorRegistry::with_builtins());
    let compiler = Compiler::new(registry);
    let set = policies(&[
        r#"[:and [:= [:doc :role] "admin"] [:in [:doc :env] #{"dev" "prod"}]]"#,
        r#"[:not [:matches [:doc :email] "@example\\.org$"]]"#,
        "[:and [:>= [:doc :age] 18] [:< [:doc :age] 65]]",
        r#"[:not [:starts-with [:doc :host] "tmp-"]]"#,
    ])?;
    let documents = [
        r#"{}"#,
        r#"{"doc": {}}"#,
        r#"{"doc": {"role": "admin", "env": "prod", "email": "a@b.com", "age": 30, "host": "api"}}"#,
        r#"{"doc": {"role": "admin", "env": "qa", "email": "a@example.org", "age": 30}}"#,
        r#"{"doc": {"role": "user", "age": 17.5, "host": "tmp-1"}}"#,
        r#"{"doc": {"role": "admin", "env": "dev", "age": "30", "host": null}}"#,
        r#"{"doc": {"email": 42, "age": 64.99}}"#,
    ];

    let compiled = [Tier::T0, Tier::T1, Tier::T2, Tier::T3]
        .into_iter()
        .map(|tier| compiler.compile(&set, options().with_tier(tier)))
        .collect::<Result<Vec<_>, _>>()?;
    for (policy, tier) in compiled.iter().zip([Tier::T0, Tier::T1, Tier::T2, Tier::T3]) {
        assert_eq!(policy.tier(), tier);
    }

    for d in documents {
        let d = doc(d)?;
        let expected = compiled[0].evaluate(&d)?;
        for policy in &compiled[1..] {
            assert_eq!(policy.evaluate(&d)?, expected, "{} on {d}", policy.tier());
        }
    }
    Ok(())
}

#[test]
fn tiers_match_evaluate_whatever_the_leaf_order() -> Result<()> {
    let registry = Arc::new(OperatorRegistry::with_builtins());
    let interpreter = Interpreter::new(&registry);
    let compiler = Compiler::new(registry);
    let cases = [
        ("[:and [:= [:b] 1] [:= [:a] 1]]", r#"{"a": 0, "b": 0}"#),
        ("[:and [:> [:z :y] 3] [:< [:z :x] 0] [:= [:a] 1]]", r#"{"z": {"x": 5, "y": 1}}"#),
        ("[:and [:or [:= [:b] 1] [:= [:c] 1]] [:= [:a] 1]]", r#"{"a": 0, "b": 0, "c": 0}"#),
        ("[:and [:forall [:xs] [:= [:v] 1]] [:= [:a] 1]]", r#"{"a": 0, "xs": [{"v": 0}]}"#),
    ];
    for (text, d) in cases {
        let node = parse_str(text)?;
        let d = doc(d)?;
        let expected = interpreter.evaluate(&node, &d)?;
        assert!(expected.is_conflict(), "{text}");
        for tier in [Tier::T0, Tier::T1, Tier::T2, Tier::T3] {
            let policy = compiler.compile(&[node.clone()], options().with_tier(tier))?;
            assert_eq!(policy.evaluate(&d)?, expected, "{text} as {}", policy.tier());
        }
    }
    Ok(())
}

#[test]
fn compiled_policies_are_shared_across_threads() -> Result<()> {
    let policy = compile(
        &policies(&[r#"[:and [:= [:role] "admin"] [:> [:level] 2]]"#])?,
        options(),
    )?;
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let policy = policy.clone();
            thread::spawn(move || -> Result<Residual> {
                let d = Value::from_json_str(&format!(r#"{{"role": "admin", "level": {i}}}"#))?;
                Ok(policy.evaluate(&d)?)
            })
        })
        .collect();
    for (i, h) in handles.into_iter().enumerate() {
        let residual = h.join().map_err(|_| anyhow::anyhow!("thread panicked"))??;
        assert_eq!(residual.is_satisfied(), i > 2);
    }
    Ok(())
}
