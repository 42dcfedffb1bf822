pub const RECIPE_COUNT_PER_PAGE: i64 = 6;
pub const USER_COUNT_PER_PAGE: i64 = 6;
pub const MAX_COUNT_PER_PAGE: i64 = 100;

pub const RECIPE_NAME_MAX_LENGTH: usize = 256;
pub const RECIPE_IMAGE_FOLDER: &str = "recipes/images";
pub const AVATAR_FOLDER: &str = "avatars";

pub const SHOPPING_LIST_FILENAME: &str = "shopping_list.txt";

/// Rows per bulk insert; keeps the bind count under the Postgres limit.
pub const BULK_INSERT_CHUNK: usize = 65535 / 4;
