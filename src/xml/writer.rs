//! xml/writer — XmlWriter: визитор, печатающий описание (dump).

use anyhow::Result;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use std::io::Write;

use super::{MetadataVisitor, SuperblockInfo};

pub struct XmlWriter<W: Write> {
    w: Writer<W>,
}

impl<W: Write> XmlWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            w: Writer::new_with_indent(out, b' ', 2),
        }
    }

    pub fn into_inner(self) -> W {
        self.w.into_inner()
    }

    fn start(&mut self, e: BytesStart) -> Result<()> {
        self.w.write_event(Event::Start(e))?;
        Ok(())
    }

    fn empty(&mut self, e: BytesStart) -> Result<()> {
        self.w.write_event(Event::Empty(e))?;
        Ok(())
    }

    fn end(&mut self, name: &str) -> Result<()> {
        self.w.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }
}

impl<W: Write> MetadataVisitor for XmlWriter<W> {
    fn superblock_begin(&mut self, sb: &SuperblockInfo) -> Result<()> {
        let mut e = BytesStart::new("superblock");
        e.push_attribute(("block_size", sb.block_size.to_string().as_str()));
        e.push_attribute(("nr_blocks", sb.nr_blocks.to_string().as_str()));
        e.push_attribute(("current_era", sb.current_era.to_string().as_str()));
        self.start(e)
    }

    fn superblock_end(&mut self) -> Result<()> {
        self.end("superblock")?;
        self.w.get_mut().write_all(b"\n")?;
        Ok(())
    }

    fn writeset_begin(&mut self, era: u32, nr_bits: u32) -> Result<()> {
        let mut e = BytesStart::new("writeset");
        e.push_attribute(("era", era.to_string().as_str()));
        e.push_attribute(("nr_bits", nr_bits.to_string().as_str()));
        self.start(e)
    }

    fn writeset_bit(&mut self, block: u32, value: bool) -> Result<()> {
        let mut e = BytesStart::new("bit");
        e.push_attribute(("block", block.to_string().as_str()));
        e.push_attribute(("value", if value { "true" } else { "false" }));
        self.empty(e)
    }

    fn writeset_end(&mut self) -> Result<()> {
        self.end("writeset")
    }

    fn era_array_begin(&mut self) -> Result<()> {
        self.start(BytesStart::new("era_array"))
    }

    fn era(&mut self, block: u32, era: u32) -> Result<()> {
        let mut e = BytesStart::new("era");
        e.push_attribute(("block", block.to_string().as_str()));
        e.push_attribute(("era", era.to_string().as_str()));
        self.empty(e)
    }

    fn era_array_end(&mut self) -> Result<()> {
        self.end("era_array")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse::parse_reader;

    /// Визитор, который просто пересказывает события строками.
    #[derive(Default)]
    struct Log(Vec<String>);

    impl MetadataVisitor for Log {
        fn superblock_begin(&mut self, sb: &SuperblockInfo) -> Result<()> {
            self.0.push(format!("sb {} {} {}", sb.block_size, sb.nr_blocks, sb.current_era));
            Ok(())
        }
        fn superblock_end(&mut self) -> Result<()> {
            self.0.push("/sb".into());
            Ok(())
        }
        fn writeset_begin(&mut self, era: u32, nr_bits: u32) -> Result<()> {
            self.0.push(format!("ws {} {}", era, nr_bits));
            Ok(())
        }
        fn writeset_bit(&mut self, block: u32, value: bool) -> Result<()> {
            self.0.push(format!("bit {} {}", block, value));
            Ok(())
        }
        fn writeset_end(&mut self) -> Result<()> {
            self.0.push("/ws".into());
            Ok(())
        }
        fn era_array_begin(&mut self) -> Result<()> {
            self.0.push("ea".into());
            Ok(())
        }
        fn era(&mut self, block: u32, era: u32) -> Result<()> {
            self.0.push(format!("era {} {}", block, era));
            Ok(())
        }
        fn era_array_end(&mut self) -> Result<()> {
            self.0.push("/ea".into());
            Ok(())
        }
    }

    #[test]
    fn written_document_parses_back() {
        let mut w = XmlWriter::new(Vec::new());
        w.superblock_begin(&SuperblockInfo {
            block_size: 128,
            nr_blocks: 16,
            current_era: 3,
        })
        .unwrap();
        w.writeset_begin(1, 16).unwrap();
        w.writeset_bit(4, true).unwrap();
        w.writeset_end().unwrap();
        w.era_array_begin().unwrap();
        w.era(4, 2).unwrap();
        w.era_array_end().unwrap();
        w.superblock_end().unwrap();
        let text = String::from_utf8(w.into_inner()).unwrap();
        assert!(text.starts_with("<superblock block_size=\"128\" nr_blocks=\"16\" current_era=\"3\">"));
        assert!(text.contains("\n    <bit block=\"4\" value=\"true\"/>"));

        let mut log = Log::default();
        parse_reader(text.as_bytes(), &mut log, 0).unwrap();
        assert_eq!(
            log.0,
            vec![
                "sb 128 16 3", "ws 1 16", "bit 4 true", "/ws", "ea", "era 4 2", "/ea", "/sb"
            ]
        );
    }

    #[test]
    fn unknown_element_is_malformed() {
        let mut log = Log::default();
        let doc = "<superblock block_size=\"1\" nr_blocks=\"1\" current_era=\"1\"><foo/></superblock>";
        let err = parse_reader(doc.as_bytes(), &mut log, 0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<crate::error::EraError>(),
            Some(crate::error::EraError::MalformedDescription(_))
        ));
    }
}
