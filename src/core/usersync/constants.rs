/// Prefix on every local user id so foreign ids accidentally sent in
/// our id field are easy to catch
pub const VEX_USER_ID_PREFIX: &str = "vx-";

/// Cookie param carrying the exchange user id
pub const VEX_COOKIE_ID_PARAM: &str = "vxid";

/// Macro placeholder in partner sync URLs replaced with the local
/// exchange user id
pub const VEX_LOCAL_ID_MACRO: &str = "{VXID}";
