const INFLUXDB_ENDPOINT: &str = "POKER_INFLUXDB_ENDPOINT";

pub fn get_influxdb_endpoint() -> Option<String> {
    std::env::var(INFLUXDB_ENDPOINT)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

const ENDPOINTS_FILE: &str = "POKER_FILE";

pub fn get_endpoints_file() -> Option<String> {
    std::env::var(ENDPOINTS_FILE)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
