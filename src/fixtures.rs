#[cfg(test)]
pub mod test {
    use std::fs;
    use std::path::{Path, PathBuf};

    use crate::tree::{Arena, NodeId};

    /// Parse an inline document into a fresh arena.
    pub fn parse(xml: &str) -> (Arena, NodeId) {
        let mut arena = Arena::new();
        let root = arena
            .parse_document(xml, Path::new("test.xml"))
            .expect("fixture document must be well-formed");
        (arena, root)
    }

    /// Write `contents` to `dir/name`, creating parent directories.
    pub fn write_spec(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        path
    }

    // -- Fixture for end-to-end compilation tests -------------------------------

    /// Root document that pulls its options from `common.xml`.
    pub const SERVER_XML: &str = r#"<config namespace="acme" name="server_config" root="server">
  <include file="common.xml"/>
</config>"#;

    pub const COMMON_XML: &str = r#"<config>
  <option name="host" type="string" default="localhost" desc="Host to bind"/>
</config>"#;

    /// A richer document exercising branches, enumerations and bounds.
    pub const APP_XML: &str = r#"<config namespace="acme::app" name="app_config" alias="app" root="app">
  <option name="address" type="string" desc="Listen address" min-length="1" max-length="64"/>
  <option name="mode" type="string" default="fast" desc="Execution mode">
    <value val="fast" desc="Optimize for speed"/>
    <value val="safe" desc="Optimize for safety"/>
  </option>
  <option name="workers" type="int" default="4" min="1" max="64" desc="Worker count"/>
  <option name="sink" desc="Output sink" unique="false">
    <name val="console"/>
    <name val="file"/>
    <option name="path" type="string" required="false" desc="File path"/>
  </option>
</config>"#;

    #[test]
    fn fixtures_parse() {
        for xml in [SERVER_XML, COMMON_XML, APP_XML] {
            let (arena, root) = parse(xml);
            assert!(!arena.node(root).children().is_empty());
        }
    }
}
