// Common test utilities
#![allow(dead_code)]

use std::collections::HashMap;

use flavorize::codegen::attribute::NamedAttribute;
use flavorize::codegen::class::ClassFile;
use flavorize::codegen::code::MethodBody;
use flavorize::codegen::constpool::Constant;
use flavorize::codegen::field::FieldInfo;
use flavorize::codegen::flag::access_flags::{ACC_FINAL, ACC_PUBLIC, ACC_STATIC, ACC_SUPER};
use flavorize::codegen::insn::Insn;
use flavorize::codegen::method::MethodInfo;
use flavorize::codegen::opcodes::*;
use flavorize::codegen::{class_file_to_bytes, read_class};
use flavorize::rewrite::{Catalog, TemplateBinding};
use flavorize::verify::analyze;

pub const STRING: &str = "Ljava/lang/String;";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Builds class files in memory through the crate's own model.
pub struct ClassBuilder {
    pub class_file: ClassFile,
}

impl ClassBuilder {
    pub fn new(name: &str) -> Self {
        let mut class_file = ClassFile::new();
        class_file.access_flags = ACC_PUBLIC | ACC_SUPER;
        class_file.this_class = class_file.constant_pool.add_class(name).unwrap();
        class_file.super_class = class_file.constant_pool.add_class("java/lang/Object").unwrap();
        Self { class_file }
    }

    pub fn string(&mut self, value: &str) -> u16 {
        self.class_file.constant_pool.add_string(value).unwrap()
    }

    pub fn method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        self.class_file.constant_pool.add_method_ref(class, name, descriptor).unwrap()
    }

    pub fn field_ref(&mut self, name: &str) -> u16 {
        let this = self.class_file.this_class_name().unwrap().to_string();
        self.class_file.constant_pool.add_field_ref(&this, name, STRING).unwrap()
    }

    pub fn utf8(&mut self, value: &str) -> u16 {
        self.class_file.constant_pool.add_utf8(value).unwrap()
    }

    /// A field, with a `ConstantValue` string when `constant` is given.
    pub fn field(&mut self, flags: u16, name: &str, descriptor: &str, constant: Option<&str>) -> &mut Self {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        let mut field = FieldInfo::new(flags, name_index, descriptor_index);
        if let Some(value) = constant {
            let value_index = self.string(value);
            field
                .attributes
                .push(NamedAttribute::new_constant_value(&mut self.class_file.constant_pool, value_index).unwrap());
        }
        self.class_file.fields.push(field);
        self
    }

    /// `public static final String <name> = <value>;`
    pub fn string_constant(&mut self, name: &str, value: &str) -> &mut Self {
        self.field(ACC_PUBLIC | ACC_STATIC | ACC_FINAL, name, STRING, Some(value))
    }

    pub fn method(&mut self, flags: u16, name: &str, descriptor: &str, max_locals: u16, insns: Vec<Insn>) -> &mut Self {
        self.method_body(flags, name, descriptor, MethodBody::from_insns(max_locals, insns))
    }

    /// Add a method whose `max_stack` is the analyzed depth of `body`.
    pub fn method_body(&mut self, flags: u16, name: &str, descriptor: &str, body: MethodBody) -> &mut Self {
        let max_stack = analyze(&body, &self.class_file.constant_pool).unwrap().max_depth;
        self.method_body_with_stack(flags, name, descriptor, body, max_stack)
    }

    pub fn method_body_with_stack(
        &mut self,
        flags: u16,
        name: &str,
        descriptor: &str,
        body: MethodBody,
        max_stack: u16,
    ) -> &mut Self {
        let code = body.encode(max_stack).unwrap();
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        let mut method = MethodInfo::new(flags, name_index, descriptor_index);
        method.attributes.push(
            NamedAttribute::new_code_attribute(
                &mut self.class_file.constant_pool,
                code.max_stack,
                code.max_locals,
                code.code,
                code.exception_table,
                code.attributes,
            )
            .unwrap(),
        );
        self.class_file.methods.push(method);
        self
    }

    pub fn build(&self) -> ClassFile {
        self.class_file.clone()
    }

    pub fn bytes(&self) -> Vec<u8> {
        class_file_to_bytes(&self.class_file)
    }
}

pub fn binding(module: &str, key: &str, token: &str) -> TemplateBinding {
    TemplateBinding { module_id: module.to_string(), key: key.to_string(), literal_fallback: token.to_string() }
}

pub fn catalog(bindings: &[(&str, &str, &str)]) -> Catalog {
    Catalog::from_bindings(bindings.iter().map(|(m, k, t)| binding(m, k, t)))
}

pub fn method_index(class_file: &ClassFile, name: &str) -> Option<usize> {
    class_file.methods.iter().position(|m| class_file.method_name(m) == Some(name))
}

pub fn decoded_body(class_file: &ClassFile, name: &str) -> MethodBody {
    let index = method_index(class_file, name).unwrap_or_else(|| panic!("no method {}", name));
    MethodBody::decode(class_file.methods[index].code().unwrap()).unwrap()
}

pub fn reparse(bytes: &[u8]) -> ClassFile {
    read_class(bytes).unwrap()
}

/// A lookup call seen by [`evaluate`]: `(module, key, fallback)`.
pub type LookupCall = (String, String, String);

#[derive(Debug, Default)]
pub struct Evaluation {
    pub returned: Option<String>,
    /// `putstatic` assignments in execution order.
    pub statics: Vec<(String, String)>,
    pub lookups: Vec<LookupCall>,
}

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Builder(usize),
}

/// Run straight-line string code symbolically. A lookup call evaluates to
/// `{module.key}`; builders concatenate what is appended to them.
pub fn evaluate(class_file: &ClassFile, insns: &[Insn]) -> Evaluation {
    let pool = &class_file.constant_pool;
    let mut stack: Vec<Value> = Vec::new();
    let mut builders: Vec<String> = Vec::new();
    let mut result = Evaluation::default();

    for insn in insns {
        match insn {
            Insn::Label(_) => {}
            Insn::Ldc(index) => match pool.get(*index) {
                Some(Constant::String(_)) => stack.push(Value::Str(pool.string_value(*index).unwrap().to_string())),
                other => panic!("unexpected ldc constant {:?}", other),
            },
            Insn::Type { opcode: NEW, .. } => {
                builders.push(String::new());
                stack.push(Value::Builder(builders.len() - 1));
            }
            Insn::Op(DUP) => {
                let top = stack.last().cloned().unwrap();
                stack.push(top);
            }
            Insn::Op(POP) => {
                stack.pop();
            }
            Insn::Invoke { opcode, index } => {
                let member = pool.member_ref(*index).unwrap();
                match (*opcode, member.name) {
                    (INVOKESPECIAL, "<init>") => {
                        stack.pop();
                    }
                    (INVOKESTATIC, _) => {
                        let fallback = pop_str(&mut stack);
                        let key = pop_str(&mut stack);
                        let module = pop_str(&mut stack);
                        stack.push(Value::Str(format!("{{{}.{}}}", module, key)));
                        result.lookups.push((module, key, fallback));
                    }
                    (INVOKEVIRTUAL, "append") => {
                        let text = pop_str(&mut stack);
                        match stack.last() {
                            Some(Value::Builder(id)) => builders[*id].push_str(&text),
                            other => panic!("append on {:?}", other),
                        }
                    }
                    (INVOKEVIRTUAL, "toString") => match stack.pop() {
                        Some(Value::Builder(id)) => stack.push(Value::Str(builders[id].clone())),
                        other => panic!("toString on {:?}", other),
                    },
                    (INVOKEVIRTUAL, "concat") => {
                        let tail = pop_str(&mut stack);
                        let head = pop_str(&mut stack);
                        stack.push(Value::Str(head + &tail));
                    }
                    other => panic!("unexpected invocation {:?}", other),
                }
            }
            Insn::Field { opcode: PUTSTATIC, index } => {
                let member = pool.member_ref(*index).unwrap();
                let value = pop_str(&mut stack);
                result.statics.push((member.name.to_string(), value));
            }
            Insn::Op(ARETURN) => {
                result.returned = Some(pop_str(&mut stack));
                return result;
            }
            Insn::Op(RETURN) => return result,
            other => panic!("evaluator does not support {:?}", other),
        }
    }
    result
}

fn pop_str(stack: &mut Vec<Value>) -> String {
    match stack.pop() {
        Some(Value::Str(s)) => s,
        other => panic!("expected a string, found {:?}", other),
    }
}

/// Count instructions matching `predicate`.
pub fn count(insns: &[Insn], predicate: impl Fn(&Insn) -> bool) -> usize {
    insns.iter().filter(|i| predicate(i)).count()
}

pub fn strings_of(class_file: &ClassFile) -> HashMap<String, u16> {
    class_file
        .constant_pool
        .iter()
        .filter_map(|(i, c)| match c {
            Constant::String(_) => class_file.constant_pool.string_value(i).map(|s| (s.to_string(), i)),
            _ => None,
        })
        .collect()
}
