use std::net::UdpSocket;

use chrono::Local;

pub fn fatal(message: &str) -> ! {
    tracing::error!(message);
    std::process::exit(-1);
}

pub fn udp_sock(bind_addr: &str) -> UdpSocket {
    let sock = UdpSocket::bind(bind_addr);
    if sock.is_err() {
        let err_str = format!(
            "can't create udp socket for {bind_addr} : {}",
            sock.err().unwrap()
        );
        fatal(&err_str);
    }
    sock.unwrap()
}

/// Timestamp used in media file names, second resolution.
pub fn media_timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Last dot-separated part of the vehicle address, used to tag media files.
pub fn addr_suffix(addr: &str) -> String {
    addr.rsplit('.').next().unwrap_or(addr).to_owned()
}
