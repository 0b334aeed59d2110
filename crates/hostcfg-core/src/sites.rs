//! Site and application model
//!
//! Parsed from the server file's `system.applicationHost/sites` section so
//! a location path such as `WebSite1` or `WebSite1/app` can be mapped to
//! the physical web.config file backing it.

use crate::binding::Binding;
use crate::element::Element;
use std::env;
use std::path::PathBuf;

/// One virtual directory of an application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualDirectory {
    pub path: String,
    /// Raw physicalPath text, `%VAR%` references not yet expanded
    pub physical_path: String,
}

/// One application of a site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Application {
    /// Application path relative to the site root, e.g. `/` or `/app`
    pub path: String,
    pub virtual_directories: Vec<VirtualDirectory>,
}

impl Application {
    /// Expanded physical path of the application root
    pub fn physical_path(&self) -> Option<PathBuf> {
        self.virtual_directories
            .iter()
            .find(|v| v.path == "/")
            .map(|v| PathBuf::from(expand_environment(&v.physical_path)))
    }
}

/// One site from the sites section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    pub name: String,
    pub id: Option<u64>,
    pub applications: Vec<Application>,
    pub bindings: Vec<Binding>,
}

impl Site {
    /// The application at the given path (`/` for the site root)
    pub fn application(&self, path: &str) -> Option<&Application> {
        self.applications.iter().find(|a| a.path == path)
    }
}

/// Read every site out of a server file tree
pub fn parse_sites(root: &Element) -> Vec<Site> {
    let Some(sites) = root
        .child("system.applicationHost")
        .and_then(|host| host.child("sites"))
    else {
        return Vec::new();
    };
    sites
        .children_named("site")
        .filter_map(|site| {
            let name = site.attr("name")?.to_string();
            let id = site.attr("id").and_then(|raw| raw.parse().ok());
            let applications = site
                .children_named("application")
                .filter_map(|app| {
                    Some(Application {
                        path: app.attr("path")?.to_string(),
                        virtual_directories: app
                            .children_named("virtualDirectory")
                            .filter_map(|v| {
                                Some(VirtualDirectory {
                                    path: v.attr("path")?.to_string(),
                                    physical_path: v.attr("physicalPath")?.to_string(),
                                })
                            })
                            .collect(),
                    })
                })
                .collect();
            let bindings = site
                .child("bindings")
                .map(|bindings| {
                    bindings
                        .children_named("binding")
                        .filter_map(Binding::from_element)
                        .collect()
                })
                .unwrap_or_default();
            Some(Site {
                name,
                id,
                applications,
                bindings,
            })
        })
        .collect()
}

/// Expand `%VAR%` environment references in a physical path
///
/// References to unset variables are left in place.
pub fn expand_environment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find('%') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('%') {
            Some(end) => {
                let name = &after[..end];
                match env::var(name) {
                    Ok(value) => out.push_str(&value),
                    Err(_) => {
                        out.push('%');
                        out.push_str(name);
                        out.push('%');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push('%');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_text;

    const SERVER: &str = r#"<configuration>
  <system.applicationHost>
    <sites>
      <site name="WebSite1" id="1">
        <application path="/">
          <virtualDirectory path="/" physicalPath="/srv/website1" />
        </application>
        <application path="/app">
          <virtualDirectory path="/" physicalPath="/srv/website1/app" />
        </application>
        <bindings>
          <binding protocol="http" bindingInformation="*:8080:localhost" />
        </bindings>
      </site>
      <site name="WebSite2" id="2">
        <application path="/">
          <virtualDirectory path="/" physicalPath="/srv/website2" />
        </application>
      </site>
    </sites>
  </system.applicationHost>
</configuration>"#;

    #[test]
    fn test_parse_sites() {
        let root = parse_text(SERVER).unwrap();
        let sites = parse_sites(&root);
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0].name, "WebSite1");
        assert_eq!(sites[0].id, Some(1));
        assert_eq!(sites[0].applications.len(), 2);
        assert_eq!(sites[0].bindings.len(), 1);
        assert_eq!(
            sites[0].application("/app").unwrap().physical_path(),
            Some(PathBuf::from("/srv/website1/app"))
        );
    }

    #[test]
    fn test_missing_sites_section() {
        let root = parse_text("<configuration />").unwrap();
        assert!(parse_sites(&root).is_empty());
    }

    #[test]
    fn test_expand_environment() {
        env::set_var("HOSTCFG_TEST_ROOT", "/srv");
        assert_eq!(
            expand_environment("%HOSTCFG_TEST_ROOT%/site"),
            "/srv/site"
        );
        assert_eq!(
            expand_environment("%HOSTCFG_UNSET_VAR%/site"),
            "%HOSTCFG_UNSET_VAR%/site"
        );
        env::remove_var("HOSTCFG_TEST_ROOT");
    }
}
