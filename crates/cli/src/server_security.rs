use anyhow::{Context as AnyhowContext, Result};
use std::net::SocketAddr;

/// Addresses the facets server may listen on, after the loopback check.
#[derive(Debug)]
pub(crate) struct CheckedBind {
    pub(crate) addrs: Vec<SocketAddr>,
    pub(crate) exposed: bool,
}

impl CheckedBind {
    pub(crate) fn describe(&self) -> String {
        self.addrs
            .iter()
            .map(SocketAddr::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub(crate) async fn check_bind(bind: &str, public: bool) -> Result<CheckedBind> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host(bind)
        .await
        .with_context(|| format!("Cannot resolve --bind {bind}"))?
        .collect();
    if addrs.is_empty() {
        anyhow::bail!("--bind {bind} resolved to no addresses")
    }
    let checked = CheckedBind {
        exposed: addrs.iter().any(|addr| !addr.ip().is_loopback()),
        addrs,
    };
    ensure_allowed(bind, &checked, public)?;
    Ok(checked)
}

fn ensure_allowed(bind: &str, checked: &CheckedBind, public: bool) -> Result<()> {
    if checked.exposed && !public {
        anyhow::bail!(
            "{bind} reaches beyond loopback ({}). Facet settings and resolution are unauthenticated; rerun with --public behind a proxy you control.",
            checked.describe()
        )
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checked(addrs: &[&str]) -> CheckedBind {
        let addrs: Vec<SocketAddr> = addrs.iter().map(|a| a.parse().unwrap()).collect();
        CheckedBind {
            exposed: addrs.iter().any(|a| !a.ip().is_loopback()),
            addrs,
        }
    }

    #[tokio::test]
    async fn wildcard_bind_needs_public() {
        let local = check_bind("127.0.0.1:0", false).await.unwrap();
        assert!(!local.exposed);

        let err = check_bind("0.0.0.0:0", false).await.unwrap_err();
        assert!(err.to_string().contains("--public"));

        let open = check_bind("0.0.0.0:0", true).await.unwrap();
        assert!(open.exposed);
    }

    #[test]
    fn mixed_address_lists_count_as_exposed() {
        let loopback = checked(&["127.0.0.1:7710", "[::1]:7710"]);
        assert!(ensure_allowed("localhost:7710", &loopback, false).is_ok());
        let mixed = checked(&["127.0.0.1:7710", "0.0.0.0:7710"]);
        assert!(ensure_allowed("mixed", &mixed, false).is_err());
        assert_eq!(
            checked(&["127.0.0.1:1", "[::1]:2"]).describe(),
            "127.0.0.1:1, [::1]:2"
        );
    }
}
