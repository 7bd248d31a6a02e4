//! Run this with administrator privileges where it is required
//! in order to bind the DHCP client socket to its port 68.

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    process,
};

use eui48::MacAddress;
use log::error;
use net2::UdpBuilder;
use tokio::net::UdpSocket;

use dhcp_client::{ClientConfig, InterfaceConfig, Service};
use dhcp_framed::DhcpFramed;
use dhcp_protocol::DHCP_PORT_CLIENT;

const LEASE_DATABASE: &str = "/var/db/dhclient.leases";

fn usage() -> ! {
    eprintln!("Usage: dhclient [-p <port>] [-d] [interface]");
    process::exit(1);
}

#[tokio::main(basic_scheduler)]
async fn main() {
    env_logger::init();

    let mut client_port = DHCP_PORT_CLIENT;
    let mut no_daemon = false;
    let mut names: Vec<String> = Vec::new();

    let mut args = ::std::env::args().skip(1);
    while let Some(argument) = args.next() {
        match argument.as_str() {
            "-p" => match args.next().and_then(|port| port.parse::<u16>().ok()) {
                Some(port) if port > 0 => client_port = port,
                _ => usage(),
            },
            "-d" => no_daemon = true,
            other if other.starts_with('-') => usage(),
            name => names.push(name.to_owned()),
        }
    }
    // The service never forks; daemonization belongs to the process
    // supervisor, so -d only states the default explicitly.
    let _ = no_daemon;

    // The server port is derived from the client port by convention.
    let server_port = client_port - 1;

    if names.is_empty() {
        names.push("eth0".to_owned());
    }

    let socket = UdpBuilder::new_v4()
        .expect("Socket building error")
        .bind(SocketAddr::new(
            IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            client_port,
        ))
        .expect("Socket binding error");
    socket.set_broadcast(true).expect("Socket broadcast error");
    let socket = UdpSocket::from_std(socket).expect("Socket registration error");

    let mut config = ClientConfig::default();
    config.hostname = hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok());
    if let Ok(script) = ::std::env::var("DHCLIENT_SCRIPT") {
        config.script = PathBuf::from(script);
    }

    // Interface hardware address discovery is platform glue and not part
    // of this example; substitute the real addresses of your interfaces.
    let interfaces = names
        .into_iter()
        .enumerate()
        .map(|(index, name)| {
            InterfaceConfig::new(
                name,
                MacAddress::new([0x00, 0x0c, 0x29, 0x13, 0x0e, 0x37 + index as u8]),
            )
        })
        .collect();

    let service = Service::new(
        DhcpFramed::new(socket),
        config,
        interfaces,
        PathBuf::from(LEASE_DATABASE),
        server_port,
    );

    if let Err(error) = service.run().await {
        error!("{}", error);
        process::exit(1);
    }
}
