//! Batch rewriting of class directories, jars and single class files

mod common;

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use common::*;
use flavorize::codegen::flag::access_flags::{ACC_PUBLIC, ACC_STATIC};
use flavorize::codegen::insn::Insn;
use flavorize::codegen::opcodes::ARETURN;
use flavorize::common::classpath::{ClasspathEntry, ClasspathResolver};
use flavorize::{Catalog, Config, Transformer};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const TOKEN: &str = "`BuildConfig#library#api.example.com`";

fn templated_class(name: &str) -> Vec<u8> {
    let mut builder = ClassBuilder::new(name);
    let text = builder.string(&format!("https://{}/v1", TOKEN));
    builder.method(ACC_PUBLIC | ACC_STATIC, "url", "()Ljava/lang/String;", 0, vec![Insn::Ldc(text), Insn::Op(ARETURN)]);
    builder.bytes()
}

fn plain_class(name: &str) -> Vec<u8> {
    let mut builder = ClassBuilder::new(name);
    let text = builder.string("https://plain.example.com");
    builder.method(ACC_PUBLIC | ACC_STATIC, "url", "()Ljava/lang/String;", 0, vec![Insn::Ldc(text), Insn::Op(ARETURN)]);
    builder.bytes()
}

fn lookup_catalog() -> Catalog {
    catalog(&[("library", "HOST", TOKEN)])
}

fn put(root: &Path, relative: &str, bytes: &[u8]) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, bytes).unwrap();
}

fn returned_url(bytes: &[u8]) -> Option<String> {
    let class_file = reparse(bytes);
    evaluate(&class_file, &decoded_body(&class_file, "url").insns).returned
}

#[test]
fn test_directory_is_rewritten_in_place() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let templated = templated_class("com/example/Api");
    let plain = plain_class("com/example/Plain");
    // A resource class carrying a template must still be left alone.
    let resources = templated_class("com/example/R$string");
    put(dir.path(), "com/example/Api.class", &templated);
    put(dir.path(), "com/example/Plain.class", &plain);
    put(dir.path(), "com/example/R$string.class", &resources);

    let catalog = lookup_catalog();
    let config = Config::default();
    let report = Transformer::new(&catalog, &config)
        .transform_inputs(&[ClasspathEntry::Directory(dir.path().to_path_buf())], None)
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.rewritten, vec!["com/example/Api.class".to_string()]);
    assert_eq!(report.unchanged, 1);
    assert_eq!(report.skipped, 1);

    let rewritten = fs::read(dir.path().join("com/example/Api.class")).unwrap();
    assert_ne!(rewritten, templated);
    assert_eq!(returned_url(&rewritten).as_deref(), Some("https://{library.HOST}/v1"));
    assert_eq!(fs::read(dir.path().join("com/example/Plain.class")).unwrap(), plain);
    assert_eq!(fs::read(dir.path().join("com/example/R$string.class")).unwrap(), resources);
}

#[test]
fn test_directory_is_mirrored_to_output() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let templated = templated_class("com/example/Api");
    let plain = plain_class("com/example/Plain");
    put(input.path(), "com/example/Api.class", &templated);
    put(input.path(), "com/example/Plain.class", &plain);
    put(input.path(), "META-INF/services/com.example.Service", b"com.example.Impl\n");

    let catalog = lookup_catalog();
    let config = Config { jobs: Some(2), ..Config::default() };
    let report = Transformer::new(&catalog, &config)
        .transform_inputs(&[ClasspathEntry::Directory(input.path().to_path_buf())], Some(output.path()))
        .unwrap();
    assert_eq!(report.rewritten.len(), 1);

    // Inputs are untouched.
    assert_eq!(fs::read(input.path().join("com/example/Api.class")).unwrap(), templated);

    let mirrored = fs::read(output.path().join("com/example/Api.class")).unwrap();
    assert_eq!(returned_url(&mirrored).as_deref(), Some("https://{library.HOST}/v1"));
    assert_eq!(fs::read(output.path().join("com/example/Plain.class")).unwrap(), plain);
    assert_eq!(
        fs::read(output.path().join("META-INF/services/com.example.Service")).unwrap(),
        b"com.example.Impl\n".to_vec()
    );
}

fn write_jar(path: &Path, entries: &[(&str, &[u8], CompressionMethod)]) {
    let mut writer = ZipWriter::new(File::create(path).unwrap());
    writer.add_directory("com/", SimpleFileOptions::default()).unwrap();
    for (name, data, method) in entries {
        writer.start_file(*name, SimpleFileOptions::default().compression_method(*method)).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap();
}

fn read_jar(path: &Path) -> Vec<(String, CompressionMethod, Vec<u8>)> {
    let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut entries = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).unwrap();
        let mut data = Vec::new();
        entry.read_to_end(&mut data).unwrap();
        entries.push((entry.name().to_string(), entry.compression(), data));
    }
    entries
}

#[test]
fn test_jar_is_rewritten_in_place() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let jar = dir.path().join("library.jar");
    let templated = templated_class("com/example/Api");
    let plain = plain_class("com/example/Plain");
    write_jar(
        &jar,
        &[
            ("META-INF/MANIFEST.MF", &b"Manifest-Version: 1.0\n"[..], CompressionMethod::Deflated),
            ("com/example/Api.class", templated.as_slice(), CompressionMethod::Deflated),
            ("com/example/Plain.class", plain.as_slice(), CompressionMethod::Stored),
        ],
    );

    let catalog = lookup_catalog();
    let config = Config::default();
    let entries = ClasspathResolver::resolve_entries(&[jar.display().to_string()]).unwrap();
    assert_eq!(entries, vec![ClasspathEntry::Jar(jar.clone())]);
    let report = Transformer::new(&catalog, &config).transform_inputs(&entries, None).unwrap();
    assert_eq!(report.rewritten, vec!["com/example/Api.class".to_string()]);
    assert_eq!(report.unchanged, 1);

    let contents = read_jar(&jar);
    let names: Vec<&str> = contents.iter().map(|(name, _, _)| name.as_str()).collect();
    assert_eq!(names, vec!["com/", "META-INF/MANIFEST.MF", "com/example/Api.class", "com/example/Plain.class"]);
    assert_eq!(contents[1].2, b"Manifest-Version: 1.0\n".to_vec());
    assert_eq!(returned_url(&contents[2].2).as_deref(), Some("https://{library.HOST}/v1"));
    assert_eq!(contents[3].1, CompressionMethod::Stored);
    assert_eq!(contents[3].2, plain);
    let names: Vec<_> = fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
    assert_eq!(names, vec![std::ffi::OsString::from("library.jar")]);
}

#[test]
fn test_unchanged_jar_is_not_rewritten() {
    let dir = tempfile::tempdir().unwrap();
    let jar = dir.path().join("plain.jar");
    let plain = plain_class("com/example/Plain");
    write_jar(&jar, &[("com/example/Plain.class", plain.as_slice(), CompressionMethod::Deflated)]);
    let before = fs::read(&jar).unwrap();

    let catalog = lookup_catalog();
    let config = Config::default();
    let report = Transformer::new(&catalog, &config).transform_inputs(&[ClasspathEntry::Jar(jar.clone())], None).unwrap();
    assert!(report.rewritten.is_empty());
    assert_eq!(fs::read(&jar).unwrap(), before);
}

#[test]
fn test_single_class_file_to_output() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let path = input.path().join("Api.class");
    fs::write(&path, templated_class("com/example/Api")).unwrap();

    let catalog = lookup_catalog();
    let config = Config::default();
    let report = Transformer::new(&catalog, &config)
        .transform_inputs(&[ClasspathEntry::ClassFile(path)], Some(output.path()))
        .unwrap();
    assert_eq!(report.rewritten, vec!["Api.class".to_string()]);
    let written = fs::read(output.path().join("Api.class")).unwrap();
    assert_eq!(returned_url(&written).as_deref(), Some("https://{library.HOST}/v1"));
}

#[test]
fn test_lookup_class_is_never_rewritten() {
    let dir = tempfile::tempdir().unwrap();
    let delegate = templated_class("com/android/BuildConfigDelegate");
    put(dir.path(), "com/android/BuildConfigDelegate.class", &delegate);

    let catalog = lookup_catalog();
    let config = Config::default();
    let report = Transformer::new(&catalog, &config)
        .transform_inputs(&[ClasspathEntry::Directory(dir.path().to_path_buf())], None)
        .unwrap();
    assert_eq!(report.skipped, 1);
    assert_eq!(fs::read(dir.path().join("com/android/BuildConfigDelegate.class")).unwrap(), delegate);
}
