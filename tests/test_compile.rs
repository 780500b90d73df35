
use fixtures::*;

use std::rc::Rc;

use evtc::ErrorKind;
use evtc::model::{InType, OpCodeRef};
use num_bigint::BigUint;
use pretty_assertions::assert_eq;

#[test]
fn test_end_to_end_two_files() {
    let out = compile(&[("root.json", ROOT_JSON), ("a.h", FILE_A), ("b.cpp", FILE_B)]).unwrap();
    let p = &out.provider;

    assert_eq!(out.files, vec!["root.json", "a.h", "b.cpp"]);
    assert_eq!(p.id, Some(BigUint::from(123u32)));
    assert_eq!(p.name.as_deref(), Some("N"));

    assert_eq!(p.channels.len(), 1);
    assert_eq!(p.channels["c1"].value, None);

    assert_eq!(p.tasks.len(), 1);
    assert_eq!(p.tasks["T1"].value, Some(1));

    assert_eq!(p.opcodes.len(), 1);
    assert_eq!(p.opcodes["Start"].value, Some(10));

    assert_eq!(p.events.len(), 1);
    let event = p.events.values().next().unwrap();
    assert_eq!(event.value, Some(1000));
    assert_eq!(event.opcode, OpCodeRef::Global("Start".to_owned()));

    let template = event.template.as_ref().unwrap();
    assert_eq!(template.fields().len(), 1);
    assert_eq!(template.fields()[0].in_type, InType::UInt32);
    assert_eq!(template.fields()[0].name, "count");
}

#[test]
fn test_duplicate_event_across_files_is_fatal() {
    let other = FILE_B.replace("void start", "void start_again");
    let a = format!("{}\nEVT_SCHEMA_SOURCE(\"c.cpp\")\n", FILE_A);
    let err = compile(&[
        ("root.json", ROOT_JSON),
        ("a.h", &a),
        ("b.cpp", FILE_B),
        ("c.cpp", &other),
    ])
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidContent);
    assert!(err.to_string().contains("SubA_T1_Start"), "{}", err);
}

#[test]
fn test_identical_file_contents_are_skipped() {
    let a = format!("{}\nEVT_SCHEMA_SOURCE(\"copy.cpp\")\n", FILE_A);
    let out = compile(&[
        ("root.json", ROOT_JSON),
        ("a.h", &a),
        ("b.cpp", FILE_B),
        ("copy.cpp", FILE_B),
    ])
    .unwrap();
    assert_eq!(out.skipped, vec!["copy.cpp"]);
    assert_eq!(out.provider.events.len(), 1);
}

#[test]
fn test_templates_are_shared_across_files() {
    let root = r#"{ "sources": ["a.h", "b.cpp", "c.cpp"] }"#;
    let a = r#"
        EVT_SCHEMA_CHANNEL("c1", "Chan", "Operational")
        EVT_SCHEMA_TASK("T1")
        EVT_SCHEMA_TASK("T2")
    "#;
    let b = r#"EVT_SCHEMA_1("A", "Error", "Error", "c1", "T1", "Start", "uint32", "count", n)"#;
    let c = r#"
        EVT_SCHEMA_1("B", "Error", "Error", "c1", "T2", "Stop", "UInt32", "count", n)
        EVT_SCHEMA_1("C", "Error", "Error", "c1", "T2", "Start", "uint64", "count", n)
    "#;
    let out = compile(&[("root.json", root), ("a.h", a), ("b.cpp", b), ("c.cpp", c)]).unwrap();
    let p = &out.provider;

    let a = p.events["A_T1_Start"].template.clone().unwrap();
    let b = p.events["B_T2_Stop"].template.clone().unwrap();
    let c = p.events["C_T2_Start"].template.clone().unwrap();
    assert!(Rc::ptr_eq(&a, &b));
    assert!(!Rc::ptr_eq(&a, &c));
    assert_eq!(p.templates.len(), 2);
}

#[test]
fn test_include_is_read_before_queued_sources() {
    let root = r#"{ "sources": ["first.c", "second.c"] }"#;
    let first = r#"EVT_SCHEMA_INCLUDE("nested.h") EVT_SCHEMA_TASK("first")"#;
    let nested = r#"EVT_SCHEMA_TASK("nested")"#;
    let second = r#"EVT_SCHEMA_TASK("second")"#;
    let out = compile(&[
        ("root.json", root),
        ("first.c", first),
        ("second.c", second),
        ("nested.h", nested),
    ])
    .unwrap();
    assert_eq!(out.files, vec!["root.json", "first.c", "nested.h", "second.c"]);
    // Name order drives assignment, not file order.
    assert_eq!(out.provider.tasks["first"].value, Some(1));
    assert_eq!(out.provider.tasks["nested"].value, Some(2));
    assert_eq!(out.provider.tasks["second"].value, Some(3));
}

#[test]
fn test_deep_include_chain() {
    let mut files: Vec<(String, String)> = vec![("root.json".into(), r#"{"sources": ["f0.h"]}"#.into())];
    for i in 0..2000 {
        files.push((
            format!("f{}.h", i),
            format!("EVT_SCHEMA_INCLUDE(\"f{}.h\") EVT_SCHEMA_OPCODE(\"op{}\")", i + 1, i),
        ));
    }
    files.push(("f2000.h".into(), "/* end */".into()));
    let refs: Vec<(&str, &str)> = files.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
    let err = compile(&refs).unwrap_err();
    // 2000 global opcodes cannot fit into 10..=239.
    assert_eq!(err.kind(), ErrorKind::InvalidContent);
}

#[test]
fn test_pinned_values_from_root_document() {
    let root = r#"{
        "provider": {"id": "{00000000-0000-0000-0000-0000000000ff}", "name": "N"},
        "channels": [{"id": "c1", "name": "Chan", "type": "Admin", "value": 16}],
        "tasks": [{"name": "T1", "value": 7, "opcodes": [{"name": "Begin"}]}],
        "opcodes": [{"name": "G", "value": 10}],
        "sources": ["a.cpp"]
    }"#;
    let a = r#"
        EVT_SCHEMA_CHANNEL("c1", "Chan", "Admin")
        EVT_SCHEMA_TASK("T2")
        EVT_SCHEMA_1("S", "Warning", "Verbose", "c1", "T1", "Begin", "int32", "code", code)
    "#;
    let out = compile(&[("root.json", root), ("a.cpp", a)]).unwrap();
    let p = &out.provider;

    assert_eq!(p.id, Some(BigUint::from(255u32)));
    assert_eq!(p.channels["c1"].value, Some(16));
    assert_eq!(p.tasks["T1"].value, Some(7));
    assert_eq!(p.tasks["T2"].value, Some(1));
    assert_eq!(p.opcodes["G"].value, Some(10));
    // Task opcodes skip every value used provider wide.
    assert_eq!(p.tasks["T1"].opcodes["Begin"].value, Some(11));
    assert_eq!(
        p.events["S_T1_Begin"].opcode,
        OpCodeRef::Task("Begin".to_owned())
    );
}

#[test]
fn test_channel_pinned_out_of_range() {
    let root = r#"{"channels": [{"id": "c1", "name": "Chan", "type": "Admin", "value": 300}]}"#;
    let err = compile(&[("root.json", root)]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidContent);
    assert!(err.to_string().contains("300"));
}

#[test]
fn test_conflicting_channel_between_document_and_source() {
    let root = r#"{
        "channels": [{"id": "c1", "name": "Chan", "type": "Admin"}],
        "sources": ["a.cpp"]
    }"#;
    let a = r#"EVT_SCHEMA_CHANNEL("c1", "Chan", "Debug")"#;
    let err = compile(&[("root.json", root), ("a.cpp", a)]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidContent);
}

#[test]
fn test_task_opcode_lands_in_global_map() {
    let root = r#"{ "sources": ["a.cpp"] }"#;
    let a = r#"
        EVT_SCHEMA_TASK("T1")
        EVT_SCHEMA_TASK_OPCODE("T1", "Spin")
    "#;
    let out = compile(&[("root.json", root), ("a.cpp", a)]).unwrap();
    assert!(out.provider.tasks["T1"].opcodes.is_empty());
    assert_eq!(out.provider.opcodes["Spin"].value, Some(10));
}

#[test]
fn test_json_source_file_is_merged() {
    let root = r#"<provider name="N"><sources><source>extra.json</source><source>a.c</source></sources></provider>"#;
    let extra = r#"{"tasks": [{"name": "FromJson", "value": 5}]}"#;
    let a = r#"EVT_SCHEMA_TASK("FromSource")"#;
    let out = compile(&[("root.xml", root), ("extra.json", extra), ("a.c", a)]).unwrap();
    assert_eq!(out.provider.tasks["FromJson"].value, Some(5));
    assert_eq!(out.provider.tasks["FromSource"].value, Some(1));
}

#[test]
fn test_unknown_method_aborts() {
    let root = r#"{ "sources": ["a.c"] }"#;
    let err = compile(&[("root.json", root), ("a.c", "EVT_SCHEMA_BOGUS(1)")]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MethodNotUnderstood);
}

#[test]
fn test_missing_referenced_file() {
    let err = compile(&[("root.json", ROOT_JSON), ("a.h", FILE_A)]).unwrap_err();
    // b.cpp is referenced by a.h but missing.
    assert_eq!(err.kind(), ErrorKind::FileLoadFailure);
}

#[test]
fn test_bare_and_quoted_spellings_compile_alike() {
    let root = r#"{ "sources": ["a.h", "b.cpp"] }"#;
    let a = r#"
        EVT_SCHEMA_ALIAS(CHANNEL_ID, c1)
        EVT_SCHEMA_CHANNEL(CHANNEL_ID, "Chan", "Operational")
        EVT_SCHEMA_TASK(Socket)
    "#;
    let b = r#"
        EVT_SCHEMA_1(Net, Error, Verbose, CHANNEL_ID, Socket, Start, DWORD, bytes, n)
        EVT_SCHEMA_1("Net", "Error", "Verbose", "c1", "Socket", "Stop", "uint32", "bytes", n)
    "#;
    let out = compile(&[("root.json", root), ("a.h", a), ("b.cpp", b)]).unwrap();
    let p = &out.provider;

    assert_eq!(p.channels.len(), 1);
    assert_eq!(p.tasks["Socket"].value, Some(1));
    let start = p.events["Net_Socket_Start"].template.clone().unwrap();
    let stop = p.events["Net_Socket_Stop"].template.clone().unwrap();
    assert!(Rc::ptr_eq(&start, &stop));
}
