use std::str::FromStr;

lazy_static! {
    pub static ref ENV_TELLO_ADDR: String =
        get_env_str("ENV_TELLO_ADDR", String::from("192.168.10.1"));
    pub static ref ENV_TELLO_CTRL_PORT: u16 = get_env("ENV_TELLO_CTRL_PORT", 8889);
    pub static ref ENV_TELLO_LOCAL_PORT: u16 = get_env("ENV_TELLO_LOCAL_PORT", 8800);
    pub static ref ENV_TELLO_VIDEO_PORT: u16 = get_env("ENV_TELLO_VIDEO_PORT", 11111);
    pub static ref ENV_TELLO_RETRY_COUNT: u32 = get_env("ENV_TELLO_RETRY_COUNT", 1);
    pub static ref ENV_TELLO_RESPONSE_TIMEOUT_MS: u64 =
        get_env("ENV_TELLO_RESPONSE_TIMEOUT_MS", 10);
    pub static ref ENV_TELLO_VIDEO_WIDTH: u32 = get_env("ENV_TELLO_VIDEO_WIDTH", 960);
    pub static ref ENV_TELLO_VIDEO_HEIGHT: u32 = get_env("ENV_TELLO_VIDEO_HEIGHT", 720);
    pub static ref ENV_TELLO_VIDEO_FPS: u32 = get_env("ENV_TELLO_VIDEO_FPS", 30);
    pub static ref ENV_TELLO_MEDIA_DIR: String =
        get_env_str("ENV_TELLO_MEDIA_DIR", "./".to_owned());
    pub static ref ENV_TELLO_CONTAINER: String =
        get_env_str("ENV_TELLO_CONTAINER", "avi".to_owned());
    pub static ref ENV_TELLO_TICK_MS: u64 = get_env("ENV_TELLO_TICK_MS", 5);
    pub static ref ENV_TELLO_LOG: String = get_env_str("ENV_TELLO_LOG", "info".to_owned());
}

pub fn get_env_str(name: &str, value: String) -> String {
    return std::env::var(name).unwrap_or(value);
}

pub fn get_env<T: FromStr>(name: &str, value: T) -> T {
    let r = std::env::var(name);
    if r.is_err() {
        return value;
    }
    let r = r.unwrap().parse::<T>();
    if let Ok(res) = r {
        res
    } else {
        value
    }
}
