//! Instruction rewriting through the public `rewrite_class` entry point

mod common;

use common::*;
use flavorize::codegen::attribute::{AttributeInfo, NamedAttribute};
use flavorize::codegen::constpool::Constant;
use flavorize::codegen::flag::access_flags::{ACC_PUBLIC, ACC_STATIC};
use flavorize::codegen::insn::Insn;
use flavorize::codegen::opcodes::*;
use flavorize::rewrite::{rewrite_class, scan_class, Catalog, ClassRewriter, Rewrite, BOOTSTRAP_MEMBER};
use flavorize::{Config, LookupTarget};

const API_URL: &str = "`BuildConfig#library#https://api.example.com`";
const APP_NAME: &str = "`BuildConfig#app#Example`";

fn standard_catalog() -> Catalog {
    catalog(&[("library", "API_URL", API_URL), ("app", "APP_NAME", APP_NAME)])
}

/// `public static String value() { return "<text>"; }`
fn returning_class(text: &str) -> ClassBuilder {
    let mut builder = ClassBuilder::new("com/example/Endpoints");
    let index = builder.string(text);
    builder.method(ACC_PUBLIC | ACC_STATIC, "value", "()Ljava/lang/String;", 0, vec![Insn::Ldc(index), Insn::Op(ARETURN)]);
    builder
}

#[test]
fn test_class_without_templates_is_left_alone() {
    init_logging();
    let builder = returning_class("https://plain.example.com");
    let bytes = builder.bytes();
    let result = rewrite_class(&bytes, &standard_catalog(), &Config::default()).unwrap();
    assert!(result.is_none());
}

#[test]
fn test_two_templates_round_trip() {
    init_logging();
    let text = format!("Hello {} from {}!", API_URL, APP_NAME);
    let bytes = returning_class(&text).bytes();
    let rewritten = rewrite_class(&bytes, &standard_catalog(), &Config::default()).unwrap().unwrap();

    let class_file = reparse(&rewritten);
    let body = decoded_body(&class_file, "value");
    let evaluation = evaluate(&class_file, &body.insns);
    assert_eq!(evaluation.returned.as_deref(), Some("Hello {library.API_URL} from {app.APP_NAME}!"));
    assert_eq!(
        evaluation.lookups,
        vec![
            ("library".to_string(), "API_URL".to_string(), API_URL.to_string()),
            ("app".to_string(), "APP_NAME".to_string(), APP_NAME.to_string()),
        ]
    );
    // The original load is gone.
    let strings = strings_of(&class_file);
    let original = strings[text.as_str()];
    assert_eq!(count(&body.insns, |i| *i == Insn::Ldc(original)), 0);
}

#[test]
fn test_unresolved_token_is_kept_as_text() {
    init_logging();
    let text = "prefix `BuildConfig#unknown#value` suffix";
    let bytes = returning_class(text).bytes();
    // Nothing to look up, so the load stays as it is.
    assert_eq!(rewrite_class(&bytes, &standard_catalog(), &Config::default()).unwrap(), None);
}

#[test]
fn test_unresolved_token_beside_a_resolved_one() {
    let text = format!("{} `BuildConfig#unknown#value`", API_URL);
    let bytes = returning_class(&text).bytes();
    let rewritten = rewrite_class(&bytes, &standard_catalog(), &Config::default()).unwrap().unwrap();

    let class_file = reparse(&rewritten);
    let evaluation = evaluate(&class_file, &decoded_body(&class_file, "value").insns);
    assert_eq!(evaluation.returned.as_deref(), Some("{library.API_URL} `BuildConfig#unknown#value`"));
    assert_eq!(evaluation.lookups.len(), 1);
}

#[test]
fn test_token_only_string_has_no_literal_segments() {
    let bytes = returning_class(API_URL).bytes();
    let rewritten = rewrite_class(&bytes, &standard_catalog(), &Config::default()).unwrap().unwrap();
    let class_file = reparse(&rewritten);
    let body = decoded_body(&class_file, "value");

    // new, dup, <init>, ldc x3, lookup, append, toString, areturn
    let ops: Vec<&Insn> = body.insns.iter().filter(|i| !matches!(i, Insn::Label(_))).collect();
    assert_eq!(ops.len(), 10);
    assert_eq!(count(&body.insns, |i| matches!(i, Insn::Ldc(_))), 3);
}

#[test]
fn test_max_stack_grows_by_expansion_peak() {
    init_logging();
    let mut builder = ClassBuilder::new("com/example/Concat");
    let head = builder.string("url=");
    let templated = builder.string(API_URL);
    let concat = builder.method_ref("java/lang/String", "concat", "(Ljava/lang/String;)Ljava/lang/String;");
    builder.method(
        ACC_PUBLIC | ACC_STATIC,
        "value",
        "()Ljava/lang/String;",
        0,
        vec![Insn::Ldc(head), Insn::Ldc(templated), Insn::Invoke { opcode: INVOKEVIRTUAL, index: concat }, Insn::Op(ARETURN)],
    );
    assert_eq!(builder.class_file.methods[0].code().unwrap().max_stack, 2);

    let rewritten = rewrite_class(&builder.bytes(), &standard_catalog(), &Config::default()).unwrap().unwrap();
    let class_file = reparse(&rewritten);
    let code = class_file.methods[0].code().unwrap();
    // One value below the builder, which peaks at builder + three lookup arguments.
    assert_eq!(code.max_stack, 5);

    let evaluation = evaluate(&class_file, &decoded_body(&class_file, "value").insns);
    assert_eq!(evaluation.returned.as_deref(), Some("url={library.API_URL}"));
}

#[test]
fn test_constructors_and_instance_methods_are_rewritten() {
    let mut builder = ClassBuilder::new("com/example/Client");
    let templated = builder.string(API_URL);
    let object_init = builder.method_ref("java/lang/Object", "<init>", "()V");
    let field = builder.field_ref("url");
    builder.field(ACC_PUBLIC | ACC_STATIC, "url", STRING, None);
    builder.method(
        ACC_PUBLIC,
        "<init>",
        "()V",
        1,
        vec![
            Insn::Op(ALOAD_0),
            Insn::Invoke { opcode: INVOKESPECIAL, index: object_init },
            Insn::Ldc(templated),
            Insn::Field { opcode: PUTSTATIC, index: field },
            Insn::Op(RETURN),
        ],
    );

    let rewritten = rewrite_class(&builder.bytes(), &standard_catalog(), &Config::default()).unwrap().unwrap();
    let class_file = reparse(&rewritten);
    let body = decoded_body(&class_file, "<init>");
    assert_eq!(count(&body.insns, |i| matches!(i, Insn::Invoke { opcode: INVOKESTATIC, .. })), 1);
    assert_eq!(body.insns[0], Insn::Op(ALOAD_0));
    assert!(method_index(&class_file, "<clinit>").is_none());
}

#[test]
fn test_custom_lookup_target() {
    let bytes = returning_class(API_URL).bytes();
    let config = Config { lookup: LookupTarget::new("org.example.Flavors", "resolve"), ..Config::default() };
    let rewritten = rewrite_class(&bytes, &standard_catalog(), &config).unwrap().unwrap();
    let class_file = reparse(&rewritten);
    let body = decoded_body(&class_file, "value");

    let lookup = body
        .insns
        .iter()
        .find_map(|i| match i {
            Insn::Invoke { opcode: INVOKESTATIC, index } => class_file.constant_pool.member_ref(*index),
            _ => None,
        })
        .unwrap();
    assert_eq!(lookup.class, "org/example/Flavors");
    assert_eq!(lookup.name, "resolve");
    assert_eq!(lookup.descriptor, "(Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;)Ljava/lang/String;");
}

#[test]
fn test_summary_reports_changes() {
    let text = format!("{} {}", API_URL, "`BuildConfig#nobody#x`");
    let class_file = returning_class(&text).build();
    let catalog = standard_catalog();
    let config = Config::default();
    match ClassRewriter::new(&catalog, &config).rewrite(class_file).unwrap() {
        Rewrite::Rewritten { summary, .. } => {
            assert_eq!(summary.class_name, "com/example/Endpoints");
            assert_eq!(summary.rewritten_loads, 1);
            assert_eq!(summary.changed_methods, vec!["value()Ljava/lang/String;".to_string()]);
            assert_eq!(summary.stats.lookups, 1);
            assert_eq!(summary.stats.unresolved, 1);
            assert!(summary.initializer.is_none());
        }
        Rewrite::Unchanged(_) => panic!("class should have been rewritten"),
    }
}

#[test]
fn test_rewriting_is_deterministic() {
    let text = format!("a{}b{}c", API_URL, APP_NAME);
    let bytes = returning_class(&text).bytes();
    let first = rewrite_class(&bytes, &standard_catalog(), &Config::default()).unwrap();
    let second = rewrite_class(&bytes, &standard_catalog(), &Config::default()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_rewriting_twice_changes_nothing() {
    init_logging();
    let text = format!("a{}b `BuildConfig#unknown#v` {}c", API_URL, APP_NAME);
    let catalog = standard_catalog();
    let config = Config::default();
    let once = rewrite_class(&returning_class(&text).bytes(), &catalog, &config).unwrap().unwrap();

    assert_eq!(rewrite_class(&once, &catalog, &config).unwrap(), None);
    let class_file = reparse(&once);
    let body = decoded_body(&class_file, "value");
    assert_eq!(count(&body.insns, |i| matches!(i, Insn::Invoke { opcode: INVOKESTATIC, .. })), 2);
}

#[test]
fn test_rewriting_twice_with_custom_lookup_changes_nothing() {
    let config = Config { lookup: LookupTarget::new("org.example.Flavors", "resolve"), ..Config::default() };
    let catalog = standard_catalog();
    let once = rewrite_class(&returning_class(API_URL).bytes(), &catalog, &config).unwrap().unwrap();
    assert_eq!(rewrite_class(&once, &catalog, &config).unwrap(), None);
}

/// A class whose only template sits in a `StringConcatFactory` recipe.
fn concat_recipe_class() -> Vec<u8> {
    let mut builder = ClassBuilder::new("com/example/Concat");
    let recipe = builder.string(&format!("https://{}/\u{1}", API_URL));
    let factory = builder.method_ref(
        "java/lang/invoke/StringConcatFactory",
        "makeConcatWithConstants",
        "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;Ljava/lang/String;[Ljava/lang/Object;)Ljava/lang/invoke/CallSite;",
    );
    let handle = builder.class_file.constant_pool.push(Constant::MethodHandle(6, factory)).unwrap();
    let name = builder.utf8("BootstrapMethods");
    let mut payload = vec![0, 1];
    payload.extend_from_slice(&handle.to_be_bytes());
    payload.extend_from_slice(&[0, 1]);
    payload.extend_from_slice(&recipe.to_be_bytes());
    builder.class_file.attributes.push(NamedAttribute::new(name, AttributeInfo::Custom(payload)));
    builder.bytes()
}

#[test]
fn test_concat_recipe_templates_are_reported_not_rewritten() {
    init_logging();
    let bytes = concat_recipe_class();
    assert_eq!(rewrite_class(&bytes, &standard_catalog(), &Config::default()).unwrap(), None);

    let (class_name, hits) = scan_class(&bytes).unwrap();
    assert_eq!(class_name, "com/example/Concat");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].member, BOOTSTRAP_MEMBER);
    assert_eq!(hits[0].offset, None);
    assert_eq!(hits[0].tokens, vec![API_URL.to_string()]);
}
