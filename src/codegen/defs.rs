//! Generic classfile-specific definitions

/// Header of Java class file (magic number)
pub const MAGIC: u32 = 0xCAFEBABE;

/// Name of a constructor
pub const CONSTRUCTOR_METHOD_NAME: &str = "<init>";

/// Name of a static initializer
pub const STATIC_INITIALIZER_METHOD_NAME: &str = "<clinit>";

/// Descriptor of a static initializer
pub const STATIC_INITIALIZER_DESCRIPTOR: &str = "()V";

pub const STRING_DESCRIPTOR: &str = "Ljava/lang/String;";
pub const STRING_BUILDER_CLASS: &str = "java/lang/StringBuilder";

/// Attribute names the codec decodes structurally.
pub mod attribute_names {
    pub const CODE: &str = "Code";
    pub const CONSTANT_VALUE: &str = "ConstantValue";
    pub const STACK_MAP_TABLE: &str = "StackMapTable";
    pub const LINE_NUMBER_TABLE: &str = "LineNumberTable";
    pub const LOCAL_VARIABLE_TABLE: &str = "LocalVariableTable";
    pub const LOCAL_VARIABLE_TYPE_TABLE: &str = "LocalVariableTypeTable";
    /// Kept opaque; only its static arguments are inspected.
    pub const BOOTSTRAP_METHODS: &str = "BootstrapMethods";
}

/// Major version written into classes built from scratch.
pub const JAVA_8: u16 = 52;
