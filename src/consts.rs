// Names shared by the rewriter, the catalog loader and the CLI

/// Prefix of every template token, after the opening backtick.
pub const TEMPLATE_PREFIX: &str = "BuildConfig";

/// Lookup contract defaults: `lookup(module, key, fallback) -> String`.
pub const DEFAULT_LOOKUP_CLASS: &str = "com/android/BuildConfigDelegate";
pub const DEFAULT_LOOKUP_METHOD: &str = "getString";
pub const LOOKUP_DESCRIPTOR: &str =
    "(Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;)Ljava/lang/String;";

/// StringBuilder members used by the expansion.
pub const STRING_BUILDER_APPEND: &str = "append";
pub const STRING_BUILDER_APPEND_DESCRIPTOR: &str = "(Ljava/lang/String;)Ljava/lang/StringBuilder;";
pub const TO_STRING: &str = "toString";
pub const TO_STRING_DESCRIPTOR: &str = "()Ljava/lang/String;";
pub const NO_ARG_CONSTRUCTOR_DESCRIPTOR: &str = "()V";

/// Catalog entries of any other type are ignored.
pub const CATALOG_STRING_TYPE: &str = "String";
pub const CATALOG_EXTENSION: &str = "json";

/// Class files that are generated per variant and never rewritten.
pub const DEFAULT_EXCLUDED_CLASSES: &[&str] = &["R.class", "BuildConfig.class", "module-info.class"];
/// Prefix of the nested resource classes (`R$string.class` and friends).
pub const RESOURCE_CLASS_PREFIX: &str = "R$";

pub const ENV_LOOKUP_CLASS: &str = "FLAVORIZE_LOOKUP_CLASS";
pub const ENV_LOOKUP_METHOD: &str = "FLAVORIZE_LOOKUP_METHOD";
pub const ENV_EXCLUDE: &str = "FLAVORIZE_EXCLUDE";
pub const ENV_JOBS: &str = "FLAVORIZE_JOBS";
