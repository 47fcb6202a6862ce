pub const PASSWORD_MIN_LENGTH: usize = 8;
pub const NAME_MAX_LENGTH: usize = 255;

pub const PRICE_MAX_DIGITS: u32 = 5;
pub const PRICE_DECIMAL_PLACES: u32 = 2;

pub const TOKEN_TTL_HOURS: i64 = 24;

pub const JSON_BODY_LIMIT: u64 = 64 * 1024;
pub const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

pub const MEDIA_URL: &str = "/media/";
pub const RECIPE_IMAGE_DIR: &str = "uploads/recipe";

pub const DATABASE_MAX_CONNECTIONS: u32 = 5;
