use prepro_functions::{
    CallCtx, Diagnostics, EnvironmentSnapshot, Error, ErrorCode, FunctionDescriptor,
    FunctionRegistry, PreprocessorContext, Value, ValueKind,
};
use rstest::{fixture, rstest};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<ErrorCode>>>);

impl Recorder {
    fn codes(&self) -> Vec<ErrorCode> {
        self.0.lock().unwrap().clone()
    }
}

impl Diagnostics for Recorder {
    fn is_verbose(&self) -> bool {
        false
    }

    fn log_verbose(&self, _message: &str) {}

    fn report_error(&self, error: &Error) {
        self.0.lock().unwrap().push(error.code);
    }
}

fn echo_kind(_: &mut CallCtx<'_>, args: &[Value]) -> prepro_functions::Result<Value> {
    let kinds: Vec<&str> = args.iter().map(|a| a.kind().as_str()).collect();
    Ok(Value::from(kinds.join("+")))
}

fn pick() -> FunctionDescriptor {
    FunctionDescriptor::new("pick", 2, ValueKind::String, "test overloads")
        .overload(&[ValueKind::String, ValueKind::String], echo_kind)
        .overload(&[ValueKind::String, ValueKind::Int], |_, args| {
            Ok(Value::from(format!("index {}", args[1].as_int()?)))
        })
}

#[fixture]
fn recorder() -> Recorder {
    Recorder::default()
}

fn context(recorder: &Recorder, functions: FunctionRegistry) -> PreprocessorContext {
    PreprocessorContext::builder()
        .with_functions(Arc::new(functions))
        .with_diagnostics(recorder.clone())
        .with_environment(EnvironmentSnapshot::default())
        .build()
}

fn custom_registry() -> FunctionRegistry {
    let mut reg = FunctionRegistry::new();
    reg.register(pick()).unwrap();
    reg
}

#[rstest]
fn overloads_select_entry_by_exact_kinds(recorder: Recorder) {
    let mut ctx = context(&recorder, custom_registry());
    let by_name = ctx.call("pick", &[Value::from("a"), Value::from("b")]).unwrap();
    assert_eq!(by_name, Value::from("STRING+STRING"));
    let by_index = ctx.call("pick", &[Value::from("a"), Value::from(3_i64)]).unwrap();
    assert_eq!(by_index, Value::from("index 3"));
    assert!(recorder.codes().is_empty());
}

#[rstest]
fn unlisted_tuple_is_rejected_without_coercion(recorder: Recorder) {
    let mut ctx = context(&recorder, custom_registry());
    let err = ctx
        .call("pick", &[Value::from("a"), Value::from(1.0_f64)])
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ArgumentTypeMismatch);
    assert!(err.message.contains("(STRING, FLOAT)"), "{}", err.message);
    assert!(err.message.contains("(STRING, STRING) | (STRING, INT)"), "{}", err.message);
    assert_eq!(recorder.codes(), vec![ErrorCode::ArgumentTypeMismatch]);
}

#[rstest]
fn only_declared_tuples_dispatch(recorder: Recorder) {
    let mut ctx = context(&recorder, custom_registry());
    let kinds = [
        Value::from("s"),
        Value::from(1_i64),
        Value::from(1.5_f64),
        Value::from(true),
    ];
    let mut accepted = Vec::new();
    for first in &kinds {
        for second in &kinds {
            match ctx.call("pick", &[first.clone(), second.clone()]) {
                Ok(_) => accepted.push((first.kind(), second.kind())),
                Err(err) => assert_eq!(
                    err.code,
                    ErrorCode::ArgumentTypeMismatch,
                    "({}, {})",
                    first.kind(),
                    second.kind()
                ),
            }
        }
    }
    assert_eq!(
        accepted,
        vec![
            (ValueKind::String, ValueKind::String),
            (ValueKind::String, ValueKind::Int),
        ]
    );
    assert_eq!(recorder.codes().len(), 14);
}

#[rstest]
#[case(vec![])]
#[case(vec![Value::from("a")])]
#[case(vec![Value::from(1_i64), Value::from(2_i64), Value::from(3_i64)])]
fn arity_is_checked_before_kinds(recorder: Recorder, #[case] args: Vec<Value>) {
    let mut ctx = context(&recorder, custom_registry());
    let err = ctx.call("pick", &args).unwrap_err();
    assert_eq!(err.code, ErrorCode::ArityMismatch);
}

#[rstest]
fn unknown_name_is_reported_once(recorder: Recorder) {
    let mut ctx = context(&recorder, custom_registry());
    let err = ctx.call("Pick", &[Value::from("a"), Value::from("b")]).unwrap_err();
    assert_eq!(err.code, ErrorCode::UnknownFunction);
    assert_eq!(recorder.codes(), vec![ErrorCode::UnknownFunction]);
}

#[rstest]
fn failing_entry_is_reported_once(recorder: Recorder) {
    let mut reg = FunctionRegistry::new();
    reg.register(
        FunctionDescriptor::new("boom", 0, ValueKind::String, "always fails").overload(&[], |_, _| {
            Err(Error::from_code(ErrorCode::IOFailure, "disk on fire"))
        }),
    )
    .unwrap();
    let mut ctx = context(&recorder, reg);
    let err = ctx.call("boom", &[]).unwrap_err();
    assert_eq!(err.message, "disk on fire");
    assert_eq!(recorder.codes(), vec![ErrorCode::IOFailure]);
}

#[rstest]
fn duplicate_names_are_refused() {
    let mut reg = custom_registry();
    let err = reg.register(pick()).unwrap_err();
    assert_eq!(err.code, ErrorCode::DuplicateFunction);
    assert_eq!(reg.len(), 1);
}

#[rstest]
fn builtin_names_cannot_be_shadowed() {
    let mut reg = FunctionRegistry::with_builtins();
    let before = reg.len();
    let shadow = FunctionDescriptor::new("xml_open", 1, ValueKind::String, "")
        .overload(&[ValueKind::String], echo_kind);
    assert_eq!(reg.register(shadow).unwrap_err().code, ErrorCode::DuplicateFunction);
    assert_eq!(reg.len(), before);
}

#[rstest]
#[case(FunctionDescriptor::new("empty", 1, ValueKind::String, ""))]
#[case(FunctionDescriptor::new("short", 2, ValueKind::String, "").overload(&[ValueKind::String], echo_kind))]
#[case(
    FunctionDescriptor::new("twice", 1, ValueKind::String, "")
        .overload(&[ValueKind::Int], echo_kind)
        .overload(&[ValueKind::Int], echo_kind)
)]
fn malformed_descriptors_are_refused(#[case] descriptor: FunctionDescriptor) {
    let mut reg = FunctionRegistry::new();
    let err = reg.register(descriptor).unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidDescriptor);
    assert!(reg.is_empty());
}

#[rstest]
#[case("xml_open", vec![ValueKind::String])]
#[case("xml_get", vec![ValueKind::String, ValueKind::Int])]
#[case("xml_size", vec![ValueKind::String])]
#[case("binfile", vec![ValueKind::String, ValueKind::String])]
fn builtins_resolve_their_declared_tuple(#[case] name: &str, #[case] kinds: Vec<ValueKind>) {
    let reg = FunctionRegistry::with_builtins();
    assert!(reg.resolve(name, &kinds).is_ok());
    let d = reg.descriptor(name).unwrap();
    assert_eq!(d.arity, kinds.len());
}

#[rstest]
fn builtin_result_types_are_declared() {
    let reg = FunctionRegistry::with_builtins();
    assert_eq!(reg.descriptor("xml_size").unwrap().result_type, ValueKind::Int);
    assert_eq!(reg.descriptor("binfile").unwrap().result_type, ValueKind::String);
    assert!(reg.descriptor("binfile").unwrap().reference.contains("uint8[]"));
}
