// src/constants.rs

/// The default settings file looked up in the working directory.
pub const SETTINGS_FILENAME: &str = "widgets.toml";

/// Environment variable that forces widget debug output on.
pub const DEBUG_ENV_VAR: &str = "WIDGETS_DEBUG";

/// Prefix applied to relative media paths when no settings override it.
pub const DEFAULT_MEDIA_URL: &str = "/media/";

/// Template tag that embeds a widget.
pub const WIDGET_TAG: &str = "widget";

/// Template tag that embeds a widget inside a box template.
pub const BOX_WIDGET_TAG: &str = "box_widget";

/// Context key under which a page wrapper exposes aggregated media.
pub const PAGE_WIDGETS_KEY: &str = "widgets";

/// Context key that switches on per-widget debug information.
pub const WIDGET_DEBUG_KEY: &str = "widget_debug";

/// Prefix of generated widget uids.
pub const GENERATED_UID_PREFIX: &str = "generated_";

/// Number of hash bytes kept in a generated uid (16 bytes = 32 hex characters).
pub const UID_HASH_LENGTH: usize = 16;

/// Guards recursion through extends/include chains.
pub const MAX_RECURSION_DEPTH: u32 = 32;

/// Key field used by reference options that declare no explicit fields.
pub const DEFAULT_REFERENCE_KEY: &str = "pk";
