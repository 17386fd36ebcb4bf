#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// dev-a: dwell at home, a two-minute ride ~1 km north, dwell at work.
/// dev-b: a single fix.
pub const TRACES: &str = "\
DeviceID,Timestamp,Latitude,Longitude
dev-a,2024-03-01 08:00:00,50.0,4.0
dev-b,2024-03-01 09:00:00,48.85,2.35
dev-a,2024-03-01 08:10:00,50.0,4.0
dev-a,2024-03-01 08:11:00,50.0045,4.0
dev-a,2024-03-01 08:12:00,50.009,4.0
dev-a,2024-03-01 08:30:00,50.009,4.0
";

/// A tram stop ~22 m from the ride's start
pub const POINTS: &str = "\
Latitude,Longitude,Type
10.0,10.0,Ferry
50.0002,4.0,Tram
";

/// bus-7 passes ~36 m from the ride's end; M2 is far away
pub const ROUTES: &str = "\
RouteID,Latitude,Longitude,Sequence
bus-7,50.02,4.0005,2
M2,51.0,5.0,1
bus-7,50.009,4.0005,1
M2,51.1,5.0,2
";

pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub traces: PathBuf,
    pub points: PathBuf,
    pub routes: PathBuf,
    pub outdir: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_traces(TRACES)
    }

    pub fn with_traces(traces: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, body: &str| -> PathBuf {
            let path = dir.path().join(name);
            fs::write(&path, body).unwrap();
            path
        };

        let traces = write("traces.csv", traces);
        let points = write("points.csv", POINTS);
        let routes = write("routes.csv", ROUTES);
        let outdir = dir.path().join("out");

        Self {
            dir,
            traces,
            points,
            routes,
            outdir,
        }
    }

    pub fn output(&self, name: &str) -> String {
        fs::read_to_string(self.outdir.join(name)).unwrap()
    }

    pub fn has_output(&self, name: &str) -> bool {
        Path::new(&self.outdir.join(name)).exists()
    }
}
