fn main() {
    println!("cargo:rerun-if-env-changed=CO2NODE_WIFI_SSID");
    println!("cargo:rerun-if-env-changed=CO2NODE_WIFI_PASS");
    println!("cargo:rerun-if-env-changed=CO2NODE_MQTT_HOST");
    println!("cargo:rerun-if-env-changed=CO2NODE_MQTT_USER");
    println!("cargo:rerun-if-env-changed=CO2NODE_MQTT_PASS");
    println!("cargo:rerun-if-env-changed=CO2NODE_MQTT_TOPIC");

    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
