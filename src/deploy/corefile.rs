//! Renders the CoreDNS `Corefile` serving every enabled zone from its file.
use std::collections::BTreeMap;
use std::fmt::Write as _;

use tracing::warn;

use crate::config::CorednsConfig;
use crate::merge::merge_zone;
use crate::zone::attributes::zonefile_name;

pub const DEFAULT_PORT: u16 = 53;

/// Corefile text for every enabled server.
///
/// Zones of one server share a server block, so each directive appears once
/// per block. When zones disagree on a directive's arguments, the first zone
/// in name order decides.
pub fn render_corefile(config: &CorednsConfig) -> String {
    let mut out = String::new();

    for (name, body) in &config.snippets {
        let _ = writeln!(out, "({}) {{", name);
        for line in body.lines().filter(|l| !l.trim().is_empty()) {
            let _ = writeln!(out, "    {}", line.trim());
        }
        out.push_str("}\n\n");
    }

    for (server_name, server) in config.enabled_servers() {
        let zones: Vec<_> = server
            .zones
            .iter()
            .filter(|(zone, cfg)| cfg.enabled && !zone.trim_end_matches('.').is_empty())
            .collect();
        if zones.is_empty() {
            continue;
        }

        let port = server.port.unwrap_or(DEFAULT_PORT);
        let server_dir = config.server_zone_dir(server_name, server);
        let labels: Vec<String> = zones
            .iter()
            .map(|(zone, _)| format!("{}:{}", zone.trim_end_matches('.'), port))
            .collect();

        let _ = writeln!(out, "# server {}", server_name);
        let _ = writeln!(out, "{} {{", labels.join(" "));
        let mut directives: BTreeMap<String, String> = BTreeMap::new();
        for (zone_name, zone) in zones {
            let merged = merge_zone(server, zone);
            let zone_root = zone_name.trim_end_matches('.');
            let directory = zone.zonefile_dir.as_deref().unwrap_or(&server_dir);

            let _ = writeln!(
                out,
                "    file {}/{} {}",
                directory.trim_end_matches('/'),
                zonefile_name(zone_name),
                zone_root
            );
            if !merged.notify.is_empty() {
                let _ = writeln!(out, "    transfer {} {{", zone_root);
                let _ = writeln!(out, "        to {}", merged.notify.join(" "));
                out.push_str("    }\n");
            }
            for (directive, args) in merged.config {
                let args = args.trim().to_string();
                match directives.get(&directive) {
                    Some(kept) if *kept != args => warn!(
                        server = %server_name,
                        zone = %zone_root,
                        directive = %directive,
                        kept = %kept,
                        ignored = %args,
                        "conflicting directive in shared server block"
                    ),
                    Some(_) => {}
                    None => {
                        directives.insert(directive, args);
                    }
                }
            }
        }
        for (directive, args) in &directives {
            if args.is_empty() {
                let _ = writeln!(out, "    {}", directive);
            } else {
                let _ = writeln!(out, "    {} {}", directive, args);
            }
        }
        out.push_str("}\n\n");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_snippets_and_servers() {
        let config = CorednsConfig::from_json(
            r#"{
                "snippets": {"common": "errors\nlog\n"},
                "servers": {
                    "main": {
                        "port": 1053,
                        "notify": ["192.0.2.53"],
                        "config": {"import": "common"},
                        "zones": {
                            "example.org": {"config": {"reload": "30s"}},
                            "example.net.": {"zonefile_dir": "/srv/zones/"},
                            "off.org": {"enabled": false}
                        }
                    },
                    "disabled": {"enabled": false, "zones": {"x.org": {}}}
                }
            }"#,
        )
        .unwrap();

        let expected = "\
(common) {
    errors
    log
}

# server main
example.net:1053 example.org:1053 {
    file /srv/zones/db.example.net example.net
    transfer example.net {
        to 192.0.2.53
    }
    file /etc/coredns/zones/main/db.example.org example.org
    transfer example.org {
        to 192.0.2.53
    }
    import common
    reload 30s
}

";
        assert_eq!(render_corefile(&config), expected);
    }

    #[test]
    fn shared_block_emits_each_directive_once() {
        let config = CorednsConfig::from_json(
            r#"{
                "servers": {
                    "main": {
                        "config": {"log": "", "cache": "30"},
                        "zones": {
                            "a.example": {"config": {"cache": "60"}},
                            "b.example": {},
                            "c.example": {"config": {"reload": "10s"}}
                        }
                    }
                }
            }"#,
        )
        .unwrap();

        let text = render_corefile(&config);
        assert_eq!(text.matches("    log\n").count(), 1);
        assert_eq!(text.matches("    cache ").count(), 1);
        assert!(text.contains("    cache 60\n"));
        assert_eq!(text.matches("    reload 10s\n").count(), 1);
        assert_eq!(text.matches("    file ").count(), 3);
    }
}
