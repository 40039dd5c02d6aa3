//! Scrape-side aggregation of every registered store.

use std::sync::Arc;

use fleet_core::MetricsWriter;

/// Concatenates the exposition of each part, in registration order. Takes no lock of its own;
/// every part guards its own state.
#[derive(Default, Clone)]
pub struct SnapshotCollector {
    parts: Vec<Arc<dyn MetricsWriter>>,
}

impl SnapshotCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, part: Arc<dyn MetricsWriter>) {
        self.parts.push(part);
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn write_all(&self, w: &mut dyn std::io::Write) -> std::io::Result<()> {
        for part in &self.parts {
            part.write_all(w)?;
        }
        Ok(())
    }

    pub fn render(&self) -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(4096);
        self.write_all(&mut buf)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    impl MetricsWriter for Fixed {
        fn write_all(&self, w: &mut dyn std::io::Write) -> std::io::Result<()> {
            w.write_all(self.0.as_bytes())
        }
    }

    struct Broken;

    impl MetricsWriter for Broken {
        fn write_all(&self, _w: &mut dyn std::io::Write) -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "sink closed"))
        }
    }

    #[test]
    fn concatenates_in_order() {
        let mut c = SnapshotCollector::new();
        c.push(Arc::new(Fixed("a\n")));
        c.push(Arc::new(Fixed("b\n")));
        assert_eq!(c.render().unwrap(), b"a\nb\n");
        assert!(SnapshotCollector::new().render().unwrap().is_empty());
    }

    #[test]
    fn stops_on_write_error() {
        let mut c = SnapshotCollector::new();
        c.push(Arc::new(Fixed("a\n")));
        c.push(Arc::new(Broken));
        assert!(c.render().is_err());
    }
}
