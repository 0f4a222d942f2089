//! Round-trip tests for code rendering.
//!
//! Guarantee: `parse(render(parse(line)))` yields the same statement kind,
//! numbers, parameters and comment as `parse(line)`.

use dsfapi_core::{Code, CodeFlags, CodeType, KeywordType, ParameterKind, StatementKind};

/// Assert that rendering and re-parsing gives an equivalent statement.
fn assert_roundtrip(line: &str) {
    let first = Code::parse(line).unwrap_or_else(|e| panic!("failed to parse {line:?}: {e}"));
    let rendered = first.to_string();
    let second =
        Code::parse(&rendered).unwrap_or_else(|e| panic!("failed to re-parse {rendered:?}: {e}"));
    assert_eq!(
        (
            first.statement_kind(),
            first.major_number,
            first.minor_number,
            &first.parameters,
            &first.comment,
            first.keyword_argument.as_deref(),
        ),
        (
            second.statement_kind(),
            second.major_number,
            second.minor_number,
            &second.parameters,
            &second.comment,
            second.keyword_argument.as_deref(),
        ),
        "\n--- Round-trip failed ---\nInput:    {line}\nRendered: {rendered}\n",
    );
    // Canonical text is a fixed point.
    assert_eq!(second.to_string(), rendered);
}

// ── Instructions ────────────────────────────────────────────────────────

#[test]
fn motion_and_feed() {
    assert_roundtrip("G1 X10 Y20.5 Z-0.2 E1.25 F3000");
    assert_roundtrip("G0 X0 Y0");
    assert_roundtrip("g28 x y");
}

#[test]
fn minor_numbers_and_tools() {
    assert_roundtrip("G54.3");
    assert_roundtrip("T0");
    assert_roundtrip("T-1 P0");
    assert_roundtrip("M400");
}

#[test]
fn arrays_and_driver_text() {
    assert_roundtrip("M92 E420:420");
    assert_roundtrip("M350 X16 Y16 E16:16.5");
    assert_roundtrip("M569 P0.3 S1");
    assert_roundtrip("M584 X0.0:0.1 Y0.2");
}

#[test]
fn strings_and_expressions() {
    assert_roundtrip(r#"M291 P"Say ""cheese""" R"Title" S3"#);
    assert_roundtrip(r#"M32 "0:/gcodes/part one.gcode""#);
    assert_roundtrip("G1 X{move.axes[0].max - 10} F{global.speed * 60}");
}

#[test]
fn comments() {
    assert_roundtrip("; a whole line comment");
    assert_roundtrip("M106 S255 ;fan");
    assert_roundtrip("G4 P500 (dwell) S1");
    assert_roundtrip("(only a paren comment)");
}

#[test]
fn keywords() {
    assert_roundtrip("if heat.heaters[0].current > 200");
    assert_roundtrip("  elif state.status == \"idle\"");
    assert_roundtrip("else");
    assert_roundtrip("while iterations < 10");
    assert_roundtrip("var count = 0");
    assert_roundtrip("set var.count = var.count + 1");
    assert_roundtrip("global speed = 50");
    assert_roundtrip("echo \"done\"");
    assert_roundtrip("abort \"stop\"");
    assert_roundtrip("continue");
}

#[test]
fn g53_prefix() {
    assert_roundtrip("G53 G0 X0 Y0");
    let code = Code::parse("G53 G0 X0").unwrap();
    assert!(code.has_flag(CodeFlags::ENFORCE_ABSOLUTE_POSITION));
}

// ── Structure ───────────────────────────────────────────────────────────

#[test]
fn parsed_structure() {
    let code: Code = "N10 M104 S210 T0 ;heat".parse().unwrap();
    assert_eq!(code.line_number, Some(10));
    assert_eq!(code.statement_kind(), StatementKind::Instruction(CodeType::MCode));
    assert!(code.is_major_number(104));
    assert_eq!(code.parameters.len(), 2);
    assert_eq!(code.parameter('s').unwrap().as_float().unwrap(), 210.0);
    assert_eq!(code.comment.as_deref(), Some("heat"));

    let kw: Code = "while true".parse().unwrap();
    assert_eq!(kw.statement_kind(), StatementKind::Keyword(KeywordType::While));
    assert_eq!(kw.major_number, None);
}

#[test]
fn text_fallback_survives_rendering() {
    let code = Code::parse("M117 Hello:world").unwrap();
    let p = &code.parameters[0];
    assert_eq!(p.letter(), 'H');
    assert_eq!(p.kind(), ParameterKind::String);
    assert_eq!(code.to_string(), "M117 Hello:world");
}

// ── Wire form ───────────────────────────────────────────────────────────

#[test]
fn numeric_parameter_flags_from_older_servers() {
    let json = r#"{"type":"M","channel":"HTTP","majorNumber":291,"flags":0,"parameters":[
        {"letter":"@","value":"hi","isString":1,"isDriverId":0},
        {"letter":"P","value":"1.2","isString":0,"isDriverId":1},
        {"letter":"S","value":"3","isString":false}
    ]}"#;
    let code: Code = serde_json::from_str(json).unwrap();
    assert_eq!(code.parameters[0].kind(), ParameterKind::String);
    assert!(code.parameters[0].is_string());
    assert_eq!(code.parameters[1].kind(), ParameterKind::DriverId);
    assert_eq!(code.parameter('S').unwrap().as_integer().unwrap(), 3);
}
