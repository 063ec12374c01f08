//! Scalability results persistence.

use std::io;

use poetdht::bench::ScalabilityRow;

/// Write the scalability rows as CSV. Called by rank 0 only.
pub fn write_csv(path: &str, rows: &[ScalabilityRow]) -> io::Result<()> {
    use std::io::Write;
    let mut f = std::fs::File::create(path)?;
    writeln!(
        f,
        "processes,lock_free_ops,coarse_grained_ops,fine_grained_ops,speedup"
    )?;
    for r in rows {
        writeln!(
            f,
            "{},{},{},{},{}",
            r.processes, r.lock_free_ops, r.coarse_grained_ops, r.fine_grained_ops, r.speedup
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_has_header_and_one_line_per_row() {
        let rows = [ScalabilityRow {
            processes: 4,
            lock_free_ops: 1000.0,
            coarse_grained_ops: 250.0,
            fine_grained_ops: 800.0,
            speedup: 4.0,
        }];
        let path = std::env::temp_dir().join(format!("scalability_{}.csv", std::process::id()));
        let path = path.to_str().expect("temp path is utf-8");

        write_csv(path, &rows).expect("write csv");
        let contents = std::fs::read_to_string(path).expect("read back");
        let mut lines = contents.lines();
        assert_eq!(
            lines.next(),
            Some("processes,lock_free_ops,coarse_grained_ops,fine_grained_ops,speedup")
        );
        assert_eq!(lines.next(), Some("4,1000,250,800,4"));
        assert_eq!(lines.next(), None);

        std::fs::remove_file(path).ok();
    }
}
