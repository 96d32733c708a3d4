#![deny(unsafe_code)]
//! Network stack manager

use defmt::info;
use embassy_net::Stack;

/// Wait for DHCP to hand out an address, then log it
pub async fn wait_for_config(stack: &Stack<'_>) {
    info!("Waiting for DHCP...");
    stack.wait_config_up().await;

    if let Some(config) = stack.config_v4() {
        let [a, b, c, d] = config.address.address().octets();
        info!("Network is UP, IP: {}.{}.{}.{}", a, b, c, d);

        if let Some(gateway) = config.gateway {
            let [a, b, c, d] = gateway.octets();
            info!("Gateway: {}.{}.{}.{}", a, b, c, d);
        }
    }
}
