pub const RECIPE_COUNT_PER_PAGE: i64 = 6;
pub const USER_COUNT_PER_PAGE: i64 = 6;
pub const MAX_PAGE_SIZE: i64 = 100;

pub const MIN_COOKING_TIME: i32 = 1;
pub const MAX_COOKING_TIME: i32 = 32000;
pub const MIN_INGREDIENT_AMOUNT: i32 = 1;

pub const MAX_RECIPE_NAME_LENGTH: usize = 256;
pub const MAX_USERNAME_LENGTH: usize = 150;
pub const MAX_EMAIL_LENGTH: usize = 254;

pub const SHORT_LINK_SEGMENT: &str = "r";
