//! # Descubrimiento de la IP de LAN
//! src/server/lan.rs
//!
//! Un socket UDP "conectado" a una dirección pública hace que el sistema
//! operativo elija la IP local de salida. No se envía ningún paquete.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

/// Destino de referencia para IPv4 (DNS público)
const IPV4_ROUTE_TARGET: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)), 53);

/// Destino de referencia para IPv6 (DNS público)
const IPV6_ROUTE_TARGET: SocketAddr = SocketAddr::new(
    IpAddr::V6(Ipv6Addr::new(0x2001, 0x4860, 0x4860, 0, 0, 0, 0, 0x8888)),
    53,
);

/// IP IPv4 de salida, o `127.0.0.1` si no hay ruta
pub fn lan_ipv4() -> Ipv4Addr {
    match outbound_ip(IPV4_ROUTE_TARGET) {
        Ok(IpAddr::V4(ip)) if !ip.is_unspecified() => ip,
        _ => Ipv4Addr::LOCALHOST,
    }
}

/// IP IPv6 de salida, o `::1` si no hay ruta
///
/// Se descartan loopback y link-local (`fe80::/10`), que no sirven para
/// armar una URL alcanzable desde otra máquina.
pub fn lan_ipv6() -> Ipv6Addr {
    match outbound_ip(IPV6_ROUTE_TARGET) {
        Ok(IpAddr::V6(ip)) if is_routable_v6(&ip) => ip,
        _ => Ipv6Addr::LOCALHOST,
    }
}

fn outbound_ip(target: SocketAddr) -> io::Result<IpAddr> {
    let bind_addr: SocketAddr = match target {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };

    let socket = UdpSocket::bind(bind_addr)?;
    socket.connect(target)?;
    Ok(socket.local_addr()?.ip())
}

fn is_routable_v6(ip: &Ipv6Addr) -> bool {
    let link_local = (ip.segments()[0] & 0xffc0) == 0xfe80;
    !(ip.is_loopback() || ip.is_unspecified() || link_local)
}
