//! End-to-end parser tests over complete netlists.
//!
//! Test naming convention:
//! - `test_parse_*` - source to IR lowering
//! - `test_resolve_*` - model checking and subcircuit ordering
//! - `test_build_*` - IR replay into a sink
//! - `test_error_*` - fatal input shapes

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use indexmap::IndexMap;
use spicedeck_core::circuit::{DeviceClass, Element, Statement};
use spicedeck_core::expr::{Expr, Function};
use spicedeck_core::units::{Number, Scale, Value};
use spicedeck_core::NetlistSink;
use spicedeck_parser::{parse, SpiceParser};

fn first_element(parser: &SpiceParser) -> &Element {
    parser
        .circuit()
        .elements()
        .next()
        .expect("expected at least one element")
}

// ============================================================================
// Lowering
// ============================================================================

#[test]
fn test_parse_title_and_resistor() {
    let parser = parse("Test\nR1 in out 1k\n.end\n").expect("parse failed");
    assert_eq!(parser.circuit().title, "Test");
    let element = first_element(&parser);
    assert_eq!(element.class, DeviceClass::Resistor);
    assert_eq!(element.name, "R1");
    assert_eq!(element.nodes, vec!["in", "out"]);
    assert_eq!(
        element.params.get("resistance"),
        Some(&Expr::Number(Value::int(1000)))
    );
}

#[test]
fn test_parse_suffix_unicode_micro() {
    let ascii = parse("Test\nC1 a b 2.2u\n.end\n").expect("parse failed");
    let micro = parse("Test\nC1 a b 2.2\u{00b5}\n.end\n").expect("parse failed");
    let c_ascii = first_element(&ascii).params.get("capacitance").unwrap();
    let c_micro = first_element(&micro).params.get("capacitance").unwrap();
    assert_eq!(c_ascii, c_micro);
    assert_eq!(
        c_ascii,
        &Expr::Number(Value::new(Number::Float(2.2), Scale::Micro))
    );
}

#[test]
fn test_parse_value_keyword_forms() {
    let positional = parse("T\nR1 1 2 5k\n.end\n").unwrap();
    let keyword = parse("T\nR1 1 2 R=5k\n.end\n").unwrap();
    assert_eq!(
        first_element(&positional).params.get("resistance"),
        first_element(&keyword).params.get("resistance"),
    );
}

#[test]
fn test_parse_valueless_passive_requires_model() {
    let with_model = parse("T\nR1 1 2 model=RMOD\n.model RMOD R (rsh=50)\n.end\n");
    assert!(with_model.is_ok());
    let without = parse("T\nR1 1 2\n.end\n");
    assert!(without.is_err());
}

#[test]
fn test_parse_line_continuation_equivalence() {
    let joined = parse("T\nM1 d g s b nfet W=2u L=0.5u\n.model nfet NMOS\n.end\n").unwrap();
    let split = parse("T\nM1 d g s b\n+ nfet W=2u\n+ L=0.5u\n.model nfet NMOS\n.end\n").unwrap();
    assert_eq!(joined.circuit(), split.circuit());
}

#[test]
fn test_parse_case_insensitive_directives_and_models() {
    let lower = parse("T\nD1 a k dmod\n.model dmod D (is=1e-14)\n.end\n").unwrap();
    let upper = parse("T\nD1 a k DMOD\n.MODEL dmod D (is=1e-14)\n.END\n").unwrap();
    assert_eq!(
        lower.circuit().required_models,
        upper.circuit().required_models
    );
    assert!(lower.circuit().required_models.contains("dmod"));
}

#[test]
fn test_parse_bjt_positional_forms() {
    let model_only = parse("T\nQ1 c b e 2N2222\n.model 2N2222 NPN\n.end\n").unwrap();
    let q = first_element(&model_only);
    assert_eq!(q.nodes, vec!["c", "b", "e"]);
    assert_eq!(q.model(), Some("2N2222"));
    assert!(!q.params.contains_key("area"));

    let with_area = parse("T\nQ1 c b e 2N2222 1.5\n.model 2N2222 NPN\n.end\n").unwrap();
    let q = first_element(&with_area);
    assert_eq!(q.model(), Some("2N2222"));
    assert_eq!(
        q.params.get("area"),
        Some(&Expr::Number(Value::float(1.5)))
    );

    let substrate_area = parse("T\nQ1 c b e sub 2N2222 1.5\n.model 2N2222 NPN\n.end\n").unwrap();
    let q = first_element(&substrate_area);
    assert_eq!(q.nodes, vec!["c", "b", "e", "sub"]);
    assert_eq!(q.model(), Some("2N2222"));
    assert_eq!(
        q.params.get("area"),
        Some(&Expr::Number(Value::float(1.5)))
    );

    let substrate_thermal = parse("T\nQ1 c b e sub therm 2N2222\n.model 2N2222 NPN\n.end\n").unwrap();
    let q = first_element(&substrate_thermal);
    assert_eq!(q.nodes, vec!["c", "b", "e", "sub", "therm"]);
    assert_eq!(q.model(), Some("2N2222"));
}

#[test]
fn test_parse_bjt_area_keyword_wins() {
    // With area= given, the positional probe is disabled: the trailing
    // word is the model and the one before it is a node.
    let parser = parse("T\nQ1 c b e sub 2N2222 area=2\n.model 2N2222 NPN\n.end\n").unwrap();
    let q = first_element(&parser);
    assert_eq!(q.nodes, vec!["c", "b", "e", "sub"]);
    assert_eq!(q.model(), Some("2N2222"));
    assert_eq!(q.params.get("area"), Some(&Expr::Number(Value::int(2))));
}

#[test]
fn test_parse_mosfet_keyword_merging() {
    let parser = parse(
        "T\nM1 d g s b nfet W=2u L={lmin * 2} grid=(1 2 3)\n.model nfet NMOS (vto=0.7)\n.end\n",
    )
    .unwrap();
    let m = first_element(&parser);
    assert_eq!(m.class, DeviceClass::Mosfet);
    assert_eq!(m.nodes.len(), 4);
    assert_eq!(m.model(), Some("nfet"));
    assert_eq!(
        m.params.get("w"),
        Some(&Expr::Number(Value::new(Number::Int(2), Scale::Micro)))
    );
    assert!(matches!(m.params.get("l"), Some(Expr::Binary { .. })));
    assert!(matches!(m.params.get("grid"), Some(Expr::List(items)) if items.len() == 3));
}

#[test]
fn test_parse_coupled_inductor() {
    let parser = parse("T\nL1 1 0 1m\nL2 2 0 1m\nK1 L1 L2 0.98\n.end\n").unwrap();
    let k = parser
        .circuit()
        .elements()
        .find(|e| e.class == DeviceClass::CoupledInductor)
        .unwrap();
    assert!(k.nodes.is_empty());
    assert_eq!(k.params.get("inductor1"), Some(&Expr::Str("L1".into())));
    assert_eq!(k.params.get("inductor2"), Some(&Expr::Str("L2".into())));
    assert_eq!(
        k.params.get("coupling_factor"),
        Some(&Expr::Number(Value::float(0.98)))
    );
}

#[test]
fn test_parse_switch_forms() {
    let with_control =
        parse("T\nS1 a b c d swmod ON\n.model swmod SW (ron=1)\n.end\n").unwrap();
    let s = first_element(&with_control);
    assert_eq!(s.nodes.len(), 4);
    assert_eq!(s.params.get("initial_state"), Some(&Expr::Str("ON".into())));

    let plain = parse("T\nS1 a b swmod\n.model swmod SW\n.end\n").unwrap();
    assert_eq!(first_element(&plain).nodes.len(), 2);
}

#[test]
fn test_parse_subcircuit_instance() {
    let parser = parse(
        "T\n.subckt follower in out vdd\nR1 in out 1k\n.ends\nX1 a b vcc follower params: gain=2\n.end\n",
    )
    .unwrap();
    let x = first_element(&parser);
    assert_eq!(x.class, DeviceClass::Subcircuit);
    assert_eq!(x.nodes, vec!["a", "b", "vcc"]);
    assert_eq!(x.subcircuit(), Some("follower"));
    assert_eq!(x.params.get("gain"), Some(&Expr::Number(Value::int(2))));
    assert!(parser.circuit().required_subcircuits.contains("follower"));
}

#[test]
fn test_parse_source_waveforms() {
    let parser = parse(
        "T\nV1 in 0 DC 5 AC 1 90 PULSE(0 5 1n 2n 2n 10n 20n)\nI1 out 0 SIN(0 1m 1k)\n.end\n",
    )
    .unwrap();
    let elements: Vec<&Element> = parser.circuit().elements().collect();
    let v = elements[0];
    assert_eq!(v.params.get("dc_value"), Some(&Expr::Number(Value::int(5))));
    assert_eq!(
        v.params.get("ac_magnitude"),
        Some(&Expr::Number(Value::int(1)))
    );
    assert_eq!(v.params.get("ac_phase"), Some(&Expr::Number(Value::int(90))));
    let pulse = v.transient.as_ref().unwrap();
    assert_eq!(
        pulse.params.get("initial_value"),
        Some(&Expr::Number(Value::int(0)))
    );
    assert_eq!(
        pulse.params.get("period"),
        Some(&Expr::Number(Value::new(Number::Int(20), Scale::Nano)))
    );
    let sin = elements[1].transient.as_ref().unwrap();
    assert_eq!(
        sin.params.get("frequency"),
        Some(&Expr::Number(Value::int(1000)))
    );
}

#[test]
fn test_parse_pwl_pairs() {
    let parser = parse("T\nV1 in 0 PWL(0 0 1n 5 2n 0)\n.end\n").unwrap();
    let v = first_element(&parser);
    let pwl = v.transient.as_ref().unwrap();
    let Some(Expr::List(points)) = pwl.params.get("points") else {
        panic!("expected points list");
    };
    assert_eq!(points.len(), 3);
}

#[test]
fn test_parse_controlled_sources_fold_to_behavioral() {
    let parser = parse(
        "T\n\
         V1 ctl 0 1\n\
         E1 1 0 ctl 0 2.0\n\
         G1 2 0 ctl 0 1m\n\
         F1 3 0 V1 5\n\
         H1 4 0 V1 2k\n\
         .end\n",
    )
    .unwrap();
    let elements: Vec<&Element> = parser.circuit().elements().collect();
    for element in &elements[1..] {
        assert_eq!(element.class, DeviceClass::Behavioral);
        let voltage = element.params.contains_key("voltage_expression");
        let current = element.params.contains_key("current_expression");
        assert!(voltage ^ current, "exactly one expression on {}", element.name);
    }
    // E: v(cp, cn) * gain
    let Some(Expr::Binary { lhs, .. }) = elements[1].params.get("voltage_expression") else {
        panic!("expected folded VCVS expression");
    };
    assert!(
        matches!(&**lhs, Expr::Call { function, .. } if *function == Function::V),
        "VCVS control should be a v() call"
    );
    // F: i(source) * gain
    let Some(Expr::Binary { lhs, .. }) = elements[3].params.get("current_expression") else {
        panic!("expected folded CCCS expression");
    };
    assert!(matches!(&**lhs, Expr::Call { function, .. } if *function == Function::I));
}

#[test]
fn test_parse_poly_preserved_verbatim() {
    let parser = parse("T\nE1 5 0 POLY(2) 1 0 2 0 0 1 1\n.end\n").unwrap();
    let e = first_element(&parser);
    assert_eq!(
        e.params.get("voltage_expression"),
        Some(&Expr::Raw("{ POLY (2) v(1,0) v(2,0) 0 1 1 }".into()))
    );
}

#[test]
fn test_parse_value_and_table_controls() {
    let parser = parse(
        "T\nE1 1 0 VALUE = {v(in) ** 2}\nG1 2 0 TABLE {v(in)} = (0, 0) (1, 1m) (2, 4m)\n.end\n",
    )
    .unwrap();
    let elements: Vec<&Element> = parser.circuit().elements().collect();
    assert!(matches!(
        elements[0].params.get("voltage_expression"),
        Some(Expr::Binary { .. })
    ));
    let Some(Expr::Table { points, .. }) = elements[1].params.get("current_expression") else {
        panic!("expected table control");
    };
    assert_eq!(points.len(), 3);
}

#[test]
fn test_parse_behavioral_source() {
    let parser = parse("T\nB1 out 0 V={sqrt(v(in)) + 1}\n.end\n").unwrap();
    let b = first_element(&parser);
    assert_eq!(b.class, DeviceClass::Behavioral);
    assert!(b.params.contains_key("voltage_expression"));
}

#[test]
fn test_parse_param_expressions() {
    let parser = parse("T\n.param vdd=3.3 half={vdd / 2}\nR1 1 0 {half}\n.end\n").unwrap();
    let sets = parser.parameters();
    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].get("vdd"), Some(&Expr::Number(Value::float(3.3))));
    assert!(matches!(sets[0].get("half"), Some(Expr::Binary { .. })));
}

#[test]
fn test_parse_data_block() {
    let parser = parse("T\n.data points x y\n1 10\n2 20\n3 30\n.enddata\n.end\n").unwrap();
    let table = parser.circuit().data.get("points").unwrap();
    assert_eq!(table.columns.len(), 2);
    assert_eq!(
        table.columns.get("x").unwrap(),
        &vec![Value::int(1), Value::int(2), Value::int(3)]
    );
    assert_eq!(
        table.columns.get("y").unwrap(),
        &vec![Value::int(10), Value::int(20), Value::int(30)]
    );
}

#[test]
fn test_parse_title_directive_overrides() {
    let parser = parse("Old\n.title New Title\nR1 1 0 1k\n.end\n").unwrap();
    assert_eq!(parser.circuit().title, "New Title");
}

#[test]
fn test_parse_control_directives_are_ignored() {
    let parser = parse("T\nR1 1 0 1k\n.ac dec 10 1 1Meg\n.tran 1n 100n\n.op\n.end\n").unwrap();
    assert_eq!(parser.circuit().elements().count(), 1);
}

#[test]
fn test_parse_library_predicates() {
    let models = parse("T\n.model fast NMOS\n.model slow PMOS\n").unwrap();
    assert!(models.is_only_model());
    assert!(!models.is_only_subcircuit());

    let subckts = parse("T\n.subckt cell a b\nR1 a b 1k\n.ends\n").unwrap();
    assert!(subckts.is_only_subcircuit());
    assert!(!subckts.is_only_model());

    let full = parse("T\nR1 1 0 1k\n.end\n").unwrap();
    assert!(!full.is_only_model());
    assert!(!full.is_only_subcircuit());
}

// ============================================================================
// Resolution
// ============================================================================

#[test]
fn test_resolve_missing_model_is_fatal() {
    let err = parse("Title\nM1 d g s b UNKMOD\n.end\n").unwrap_err();
    assert!(
        err.to_string().contains("Model unkmod not available"),
        "unexpected message: {err}"
    );
}

#[test]
fn test_resolve_model_from_enclosing_scope() {
    let parser = parse(
        "T\n.model nfet NMOS\n.subckt inv in out\nM1 out in 0 0 nfet\n.ends\nX1 a b inv\n.end\n",
    );
    assert!(parser.is_ok());
}

#[test]
fn test_resolve_topological_order() {
    // C instantiates B, B instantiates A; definition order is C, B, A.
    let parser = parse(
        "T\n\
         .subckt C 1 2\nXB 1 2 B\n.ends\n\
         .subckt B 1 2\nXA 1 2 A\n.ends\n\
         .subckt A 1 2\nR1 1 2 1k\n.ends\n\
         X1 in out C\n\
         .end\n",
    )
    .unwrap();
    let names: Vec<&str> = parser.subcircuits().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["A", "B", "C"]);
}

#[test]
fn test_resolve_crossed_dependencies() {
    let err = parse(
        "T\n\
         .subckt A 1 2\nXB 1 2 B\n.ends\n\
         .subckt B 1 2\nXA 1 2 A\n.ends\n\
         .end\n",
    )
    .unwrap_err();
    assert!(err.to_string().contains("Crossed dependencies"));
}

#[test]
fn test_resolve_missing_subcircuit() {
    let err = parse("T\nX1 a b GHOST\n.end\n").unwrap_err();
    assert!(err.to_string().contains("Subcircuit ghost not available"));
}

#[test]
fn test_resolve_case_renaming_is_equivalent() {
    let lower = parse("T\n.subckt cell a b\nR1 a b 1k\n.ends\nX1 1 2 CELL\n.end\n").unwrap();
    let upper = parse("T\n.subckt CELL a b\nR1 a b 1k\n.ends\nX1 1 2 cell\n.end\n").unwrap();
    assert_eq!(
        lower.circuit().required_subcircuits,
        upper.circuit().required_subcircuits
    );
}

#[test]
fn test_resolve_library_source() {
    let parser = SpiceParser::parse_library_source(
        "lib\n.model fast NMOS\n.subckt cell a b\nR1 a b 1k\n.ends\n",
    )
    .unwrap();
    assert!(parser.circuit().required_models.contains("fast"));
    assert!(parser.circuit().required_subcircuits.contains("cell"));
}

// ============================================================================
// Scope errors
// ============================================================================

#[test]
fn test_error_unclosed_subcircuit() {
    let err = parse("T\n.subckt cell a b\nR1 a b 1k\n").unwrap_err();
    assert!(err.to_string().contains("Not closed hierarchy"));
}

#[test]
fn test_error_ends_name_mismatch() {
    let err = parse("T\n.subckt cell a b\nR1 a b 1k\n.ends other\n").unwrap_err();
    assert!(err.to_string().contains("Begin and end names differ"));
}

#[test]
fn test_error_lib_name_mismatch() {
    let err = parse("T\n.lib fast\n.model m NMOS\n.endl slow\n").unwrap_err();
    assert!(err.to_string().contains("Begin and end names differ"));
    // .endl may omit the name
    assert!(parse("T\n.lib fast\n.model m NMOS\n.endl\n.end\n").is_ok());
}

#[test]
fn test_error_switch_single_control_node() {
    let err = parse("T\nS1 a b c swmod\n.model swmod SW\n.end\n").unwrap_err();
    assert!(err.to_string().contains("control node"));
}

#[test]
fn test_error_mutual_inductor_shape() {
    let err = parse("T\nK1 L1 L2 L3 0.9\n.end\n").unwrap_err();
    assert!(err.to_string().contains("two inductors"));
}

#[test]
fn test_error_bjt_incompatible_shape() {
    let err = parse("T\nQ1 c b e s t u v w\n.end\n").unwrap_err();
    assert!(err.to_string().contains("BJT"));
}

#[test]
fn test_error_data_column_mismatch() {
    let err = parse("T\n.data tab x y\n1 2 3\n.enddata\n.end\n").unwrap_err();
    assert!(err.to_string().contains("do not match"));
}

#[test]
fn test_error_title_outside_root() {
    let err = parse("T\n.subckt cell a b\n.title nope\n.ends\n.end\n").unwrap_err();
    assert!(err.to_string().contains("root circuit"));
}

// ============================================================================
// Includes and libraries on disk
// ============================================================================

static TEST_DIR_SEQ: AtomicUsize = AtomicUsize::new(0);

fn scratch_dir(tag: &str) -> PathBuf {
    let seq = TEST_DIR_SEQ.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!(
        "spicedeck-test-{}-{}-{}",
        std::process::id(),
        tag,
        seq
    ));
    fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

#[test]
fn test_parse_include_resolves_relative_to_file() {
    let dir = scratch_dir("include");
    fs::write(
        dir.join("models.cir"),
        "models\n.model nfet NMOS (vto=0.7)\n",
    )
    .unwrap();
    fs::write(
        dir.join("top.cir"),
        "Top\n.include \"models.cir\"\nR1 1 0 1k\n.end\n",
    )
    .unwrap();
    let parser = SpiceParser::parse_file(dir.join("top.cir")).expect("parse failed");
    let include = parser
        .circuit()
        .statements
        .iter()
        .find_map(|s| match s {
            Statement::Include(include) => Some(include),
            _ => None,
        })
        .expect("include statement");
    assert_eq!(include.circuit.models.len(), 1);
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_error_missing_include_carries_paths() {
    let dir = scratch_dir("missing");
    fs::write(dir.join("top.cir"), "Top\n.include \"nope.cir\"\n.end\n").unwrap();
    let err = SpiceParser::parse_file(dir.join("top.cir")).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("top.cir"), "missing breadcrumb: {message}");
    assert!(message.contains("nope.cir"), "missing target: {message}");
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_error_include_cycle() {
    let dir = scratch_dir("cycle");
    fs::write(dir.join("a.cir"), "A\n.include \"b.cir\"\n").unwrap();
    fs::write(dir.join("b.cir"), "B\n.include \"a.cir\"\n").unwrap();
    let err = SpiceParser::parse_file(dir.join("a.cir")).unwrap_err();
    assert!(err.to_string().contains("include cycle"));
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_parse_lib_call_loads_entries() {
    let dir = scratch_dir("lib");
    fs::write(
        dir.join("corners.lib"),
        "corners\n\
         .lib fast\n.model nfast NMOS (vto=0.6)\n.endl fast\n\
         .lib slow\n.model nslow NMOS (vto=0.8)\n.endl slow\n",
    )
    .unwrap();
    fs::write(
        dir.join("top.cir"),
        "Top\n.lib \"corners.lib\" fast\nR1 1 0 1k\n.end\n",
    )
    .unwrap();
    let parser = SpiceParser::parse_file(dir.join("top.cir")).expect("parse failed");
    assert_eq!(parser.circuit().library_calls.len(), 1);
    assert!(parser.circuit().library("fast").is_some());
    assert!(parser.circuit().library("slow").is_some());
    fs::remove_dir_all(&dir).ok();
}

// ============================================================================
// Build replay
// ============================================================================

#[derive(Default)]
struct RecordingSink {
    calls: Vec<String>,
}

impl NetlistSink for RecordingSink {
    fn include(&mut self, path: &Path) {
        self.calls.push(format!("include {}", path.display()));
    }

    fn parameter(&mut self, name: &str, value: &Expr) {
        self.calls.push(format!("parameter {name}={value}"));
    }

    fn model(&mut self, name: &str, device: &str, _params: &IndexMap<String, Expr>) {
        self.calls.push(format!("model {name} {device}"));
    }

    fn data(&mut self, table: &str, columns: &IndexMap<String, Vec<Value>>) {
        self.calls.push(format!("data {table} ({})", columns.len()));
    }

    fn subcircuit(
        &mut self,
        name: &str,
        nodes: &[String],
        _defaults: &IndexMap<String, Expr>,
    ) -> Self {
        self.calls.push(format!("subckt {name} {}", nodes.join(" ")));
        RecordingSink::default()
    }

    fn finish_subcircuit(&mut self, child: Self) {
        self.calls.extend(child.calls);
        self.calls.push("ends".to_string());
    }

    fn element(&mut self, element: &Element, nodes: &[String]) {
        self.calls
            .push(format!("element {} {}", element.name, nodes.join(" ")));
    }
}

#[test]
fn test_build_replays_in_order_with_ground_rewrite() {
    let parser = parse(
        "T\n\
         .param vdd=5\n\
         .model nfet NMOS\n\
         .subckt cell a b\nR1 a b 1k\n.ends\n\
         R1 in gnd 1k\n\
         X1 in gnd cell\n\
         .end\n",
    )
    .unwrap();
    let mut sink = RecordingSink::default();
    parser.build_circuit(&mut sink, "gnd").unwrap();
    assert_eq!(
        sink.calls,
        vec![
            "parameter vdd=5",
            "model nfet NMOS",
            "subckt cell a b",
            "element R1 a b",
            "ends",
            "element R1 in 0",
            "element X1 in 0",
        ]
    );
}

#[test]
fn test_build_splices_called_library() {
    let dir = scratch_dir("build-lib");
    fs::write(
        dir.join("corners.lib"),
        "corners\n.lib fast\n.model nfast NMOS (vto=0.6)\n.endl fast\n",
    )
    .unwrap();
    fs::write(
        dir.join("top.cir"),
        "Top\n.lib \"corners.lib\" fast\nR1 1 0 1k\n.end\n",
    )
    .unwrap();
    let parser = SpiceParser::parse_file(dir.join("top.cir")).unwrap();
    let mut sink = RecordingSink::default();
    parser.build_circuit(&mut sink, "0").unwrap();
    assert_eq!(
        sink.calls,
        vec!["model nfast NMOS", "element R1 1 0"]
    );
    fs::remove_dir_all(&dir).ok();
}

// ============================================================================
// Round trip
// ============================================================================

/// A sink that regenerates netlist text, for the reparse property below.
struct SpiceWriter {
    depth: usize,
    out: String,
}

impl SpiceWriter {
    fn new() -> Self {
        Self {
            depth: 0,
            out: String::from("regenerated\n"),
        }
    }

    fn push_line(&mut self, line: &str) {
        self.out.push_str(line);
        self.out.push('\n');
    }
}

/// Emit a parameter value: plain numbers and names stay bare, anything
/// else goes back into braces.
fn emit_value(expr: &Expr) -> String {
    match expr {
        Expr::Number(value) => value.to_string(),
        Expr::Str(name) => name.clone(),
        other => format!("{{{other}}}"),
    }
}

impl NetlistSink for SpiceWriter {
    fn include(&mut self, _path: &Path) {}

    fn parameter(&mut self, name: &str, value: &Expr) {
        self.push_line(&format!(".param {name}={}", emit_value(value)));
    }

    fn model(&mut self, name: &str, device: &str, params: &IndexMap<String, Expr>) {
        let mut line = format!(".model {name} {device}");
        if !params.is_empty() {
            line.push_str(" (");
            let body: Vec<String> = params
                .iter()
                .map(|(k, v)| format!("{k}={}", emit_value(v)))
                .collect();
            line.push_str(&body.join(" "));
            line.push(')');
        }
        self.push_line(&line);
    }

    fn data(&mut self, _table: &str, _columns: &IndexMap<String, Vec<Value>>) {}

    fn subcircuit(
        &mut self,
        name: &str,
        nodes: &[String],
        _defaults: &IndexMap<String, Expr>,
    ) -> Self {
        let mut child = SpiceWriter {
            depth: self.depth + 1,
            out: String::new(),
        };
        child.push_line(&format!(".subckt {name} {}", nodes.join(" ")));
        child
    }

    fn finish_subcircuit(&mut self, child: Self) {
        self.out.push_str(&child.out);
        self.push_line(".ends");
    }

    fn element(&mut self, element: &Element, nodes: &[String]) {
        let mut line = format!("{} {}", element.name, nodes.join(" "));
        let positional = match element.class {
            DeviceClass::Resistor => element.params.get("resistance"),
            DeviceClass::Capacitor => element.params.get("capacitance"),
            DeviceClass::Inductor => element.params.get("inductance"),
            DeviceClass::VoltageSource | DeviceClass::CurrentSource => {
                element.params.get("dc_value")
            }
            _ => None,
        };
        if let Some(value) = positional {
            line.push(' ');
            line.push_str(&emit_value(value));
        }
        if element.class == DeviceClass::Subcircuit {
            if let Some(name) = element.subcircuit() {
                line.push(' ');
                line.push_str(name);
            }
        }
        for (key, value) in &element.params {
            if matches!(
                key.as_str(),
                "resistance" | "capacitance" | "inductance" | "dc_value" | "subcircuit"
            ) {
                continue;
            }
            line.push_str(&format!(" {key}={}", emit_value(value)));
        }
        self.push_line(&line);
    }
}

#[test]
fn test_build_reparse_round_trip() {
    let source = "\
Original
.param vdd=5 half={vdd / 2}
.model nfet NMOS (vto=0.7)
.subckt divider in out
R1 in out 1k
R2 out 0 1k
.ends
V1 in 0 5
C1 in 0 2.2u
X1 in out divider
.end
";
    let first = parse(source).unwrap();
    let mut writer = SpiceWriter::new();
    first.build_circuit(&mut writer, "0").unwrap();
    let second = parse(&writer.out).expect("regenerated netlist must parse");

    // The writer emits one .param line per binding, so compare the
    // flattened entries rather than the set grouping.
    let flatten = |parser: &SpiceParser| -> Vec<(String, Expr)> {
        parser
            .parameters()
            .iter()
            .flat_map(|set| set.iter().map(|(k, v)| (k.clone(), v.clone())))
            .collect()
    };
    assert_eq!(flatten(&first), flatten(&second));
    assert_eq!(first.models(), second.models());
    assert_eq!(
        first.subcircuits().len(),
        second.subcircuits().len()
    );
    assert_eq!(first.subcircuits()[0].nodes, second.subcircuits()[0].nodes);
    assert_eq!(
        first.subcircuits()[0].statements,
        second.subcircuits()[0].statements
    );
    let first_elements: Vec<&Element> = first.circuit().elements().collect();
    let second_elements: Vec<&Element> = second.circuit().elements().collect();
    assert_eq!(first_elements, second_elements);
    assert_eq!(
        first.circuit().required_subcircuits,
        second.circuit().required_subcircuits
    );
}
