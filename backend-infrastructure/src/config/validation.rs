use anyhow::{anyhow, Result};

const RESERVED_PREFIXES: [&str; 3] = ["/api", "/room", "/ops"];

pub fn validate_socket_path(value: &str) -> Result<()> {
    if !value.starts_with('/') || value.len() < 2 {
        return Err(anyhow!("socket_path must start with '/' and name a route"));
    }
    if RESERVED_PREFIXES
        .iter()
        .any(|prefix| value == *prefix || value.starts_with(&format!("{}/", prefix)))
    {
        return Err(anyhow!("socket_path '{}' collides with a reserved route", value));
    }
    Ok(())
}

pub fn bus_scheme(url: &str) -> Result<&str> {
    let (scheme, _) = url
        .split_once("://")
        .ok_or_else(|| anyhow!("bus_url '{}' has no scheme", url))?;
    match scheme {
        "memory" | "redis" | "rediss" => Ok(scheme),
        other => Err(anyhow!("unsupported bus_url scheme '{}'", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_path_must_not_shadow_api_routes() {
        assert!(validate_socket_path("/socket").is_ok());
        assert!(validate_socket_path("socket").is_err());
        assert!(validate_socket_path("/").is_err());
        assert!(validate_socket_path("/api").is_err());
        assert!(validate_socket_path("/room/ws").is_err());
        assert!(validate_socket_path("/rooms").is_ok());
    }

    #[test]
    fn bus_scheme_accepts_memory_and_redis() {
        assert_eq!(bus_scheme("memory://").unwrap(), "memory");
        assert_eq!(bus_scheme("redis://localhost:6379").unwrap(), "redis");
        assert!(bus_scheme("nats://localhost").is_err());
        assert!(bus_scheme("localhost:6379").is_err());
    }
}
