#[cfg(test)]
mod tests {
    use crate::config::{FormatConfig, PipelineConfig, SourceFormat};
    use crate::core::domain::{Band, ExposureTable, ObjectId, VisitId};
    use crate::core::error::PipelineError;
    use crate::io::loaders::{LightCurveLoader, VisitFileLoader};
    use crate::parsing::columns::ColumnScheme;
    use crate::parsing::photometry_parser::parse_photometry_csv;
    use polars::prelude::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Helper to create a temp CSV file
    fn create_temp_csv(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", content).unwrap();
        temp_file
    }

    const BAND_APERTURE_CSV: &str = "obj_id,xcenter,ycenter,ra,dec,\
aperture_sum_n_12_8,aperture_sum_0_n_12_8,aperture_sum_1_n_12_8,\
aperture_sum_mask_0_n_12_8,aperture_sum_mask_1_n_12_8,\
aperture_sum_edge_0_n_12_8,aperture_sum_edge_1_n_12_8\n\
10,100.5,200.5,150.1,-20.2,100,50,50,0,0,0,0\n\
11,300.0,400.0,150.2,-20.3,98,49,49,0,3,0,0\n\
12,500.0,600.0,150.3,-20.4,50,25,25,0,0,2,0\n";

    fn exposure() -> ExposureTable {
        ExposureTable::uniform(0.0, 30.0, 25.0, 2).unwrap()
    }

    fn nuv_loader() -> LightCurveLoader {
        LightCurveLoader::new(ColumnScheme::new(&FormatConfig::default(), Band::Nuv, 12.8))
    }

    #[test]
    fn test_load_all_converts_counts() {
        let file = create_temp_csv(BAND_APERTURE_CSV);
        let df = parse_photometry_csv(file.path()).unwrap();
        let curves = nuv_loader().load_all(&df, &exposure(), VisitId(1)).unwrap();

        assert_eq!(curves.len(), 3);
        let first = &curves[0];
        assert_eq!(first.object_id, ObjectId(10));
        assert_eq!(first.cps(), &[2.0, 2.0]);
        assert_eq!(first.xcenter(), 100.5);
        assert!((first.position.ra - 150.1).abs() < 1e-12);

        let second = &curves[1];
        assert_eq!(second.cps_err()[0], 7.0 / 25.0);
        assert_eq!(second.mask_flag(), &[false, true]);
        assert!(second.cps_apcorrected().is_some());
    }

    #[test]
    fn test_load_unflagged_excludes_contaminated_objects() {
        let file = create_temp_csv(BAND_APERTURE_CSV);
        let df = parse_photometry_csv(file.path()).unwrap();
        let curves = nuv_loader().load_unflagged(&df, &exposure(), VisitId(1)).unwrap();

        let ids: Vec<ObjectId> = curves.iter().map(|lc| lc.object_id).collect();
        assert_eq!(ids, vec![ObjectId(10)]);
        for lc in &curves {
            assert_eq!(lc.len(), exposure().len());
            assert!(!lc.is_flagged());
        }
    }

    #[test]
    fn test_full_depth_totals_flag_objects() {
        let csv = "obj_id,xcenter,ycenter,aperture_sum_0_n_12_8,aperture_sum_mask_n_12_8,aperture_sum_edge_n_12_8\n\
1,10.0,10.0,20,0,0\n\
2,20.0,20.0,20,4,0\n";
        let file = create_temp_csv(csv);
        let df = parse_photometry_csv(file.path()).unwrap();
        let exposure = ExposureTable::uniform(0.0, 30.0, 25.0, 1).unwrap();
        let curves = nuv_loader().load_unflagged(&df, &exposure, VisitId(1)).unwrap();
        assert_eq!(curves.len(), 1);
        assert_eq!(curves[0].object_id, ObjectId(1));
        assert!(curves[0].position.ra.is_nan());
    }

    #[test]
    fn test_missing_band() {
        let file = create_temp_csv(BAND_APERTURE_CSV);
        let df = parse_photometry_csv(file.path()).unwrap();
        let fuv = LightCurveLoader::new(ColumnScheme::new(&FormatConfig::default(), Band::Fuv, 12.8));

        let result = fuv.load_unflagged(&df, &exposure(), VisitId(7));
        match result {
            Err(PipelineError::MissingBand { band, visit }) => {
                assert_eq!(band, Band::Fuv);
                assert_eq!(visit, VisitId(7));
            }
            other => panic!("expected MissingBand, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_exposure_is_missing_band() {
        let file = create_temp_csv(BAND_APERTURE_CSV);
        let df = parse_photometry_csv(file.path()).unwrap();
        let empty = ExposureTable::uniform(0.0, 30.0, 0.0, 2).unwrap();
        let result = nuv_loader().load_all(&df, &empty, VisitId(1));
        assert!(matches!(result, Err(PipelineError::MissingBand { .. })));
    }

    #[test]
    fn test_bins_beyond_exposure_rejected() {
        let file = create_temp_csv(BAND_APERTURE_CSV);
        let df = parse_photometry_csv(file.path()).unwrap();
        let short = ExposureTable::uniform(0.0, 30.0, 25.0, 1).unwrap();
        let result = nuv_loader().load_all(&df, &short, VisitId(1));
        assert!(matches!(result, Err(PipelineError::Schema(_))));
    }

    #[test]
    fn test_legacy_format_flag_planes() {
        let csv = "xcenter,ycenter,ra,dec,aperture_sum_0,aperture_sum_1,\
aperture_sum_flag_0,aperture_sum_flag_1,aperture_sum_edge_0,aperture_sum_edge_1\n\
1.0,2.0,3.0,4.0,25,25,1,0,0,0\n\
5.0,6.0,7.0,8.0,25,25,0,0,0,1\n\
9.0,9.0,9.0,9.0,25,25,0,0,0,0\n";
        let file = create_temp_csv(csv);
        let df = parse_photometry_csv(file.path()).unwrap();
        let format = FormatConfig {
            version: SourceFormat::LegacyCsv,
            ..FormatConfig::default()
        };
        let loader = LightCurveLoader::new(ColumnScheme::new(&format, Band::Nuv, 17.0));
        let curves = loader.load_all(&df, &exposure(), VisitId(1)).unwrap();

        // "flag" plane is edge contamination, "edge" plane is mask contamination
        assert_eq!(curves[0].edge_flag(), &[true, false]);
        assert_eq!(curves[0].mask_flag(), &[false, false]);
        assert_eq!(curves[1].mask_flag(), &[false, true]);
        assert_eq!(curves[1].edge_flag(), &[false, false]);

        // Row index stands in for the object id
        let ids: Vec<ObjectId> = curves.iter().map(|lc| lc.object_id).collect();
        assert_eq!(ids, vec![ObjectId(0), ObjectId(1), ObjectId(2)]);

        let unflagged = loader.load_unflagged(&df, &exposure(), VisitId(1)).unwrap();
        assert_eq!(unflagged.len(), 1);
        assert_eq!(unflagged[0].object_id, ObjectId(2));
    }

    #[test]
    fn test_visit_file_loader() {
        let photometry = create_temp_csv(BAND_APERTURE_CSV);
        let exposure = create_temp_csv("t0,t1,expt\n0.0,30.0,25.0\n30.0,60.0,25.0\n");
        let visit = VisitFileLoader::load(
            photometry.path(),
            exposure.path(),
            VisitId(23456),
            &PipelineConfig::default(),
        )
        .unwrap();
        assert_eq!(visit.visit, VisitId(23456));
        assert_eq!(visit.band, Band::Nuv);
        assert_eq!(visit.exposure.len(), 2);
        assert_eq!(visit.light_curves.len(), 1);
    }

    #[test]
    fn test_visit_file_loader_keeps_missing_band_error() {
        let photometry = create_temp_csv(BAND_APERTURE_CSV);
        let exposure = create_temp_csv("t0,t1,expt\n0.0,30.0,25.0\n30.0,60.0,25.0\n");
        let mut config = PipelineConfig::default();
        config.photometry.band = Band::Fuv;
        let err = VisitFileLoader::load(photometry.path(), exposure.path(), VisitId(3), &config)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::MissingBand { .. })
        ));
    }

    #[test]
    fn test_visit_file_loader_missing_file() {
        let exposure = create_temp_csv("t0,t1,expt\n0.0,30.0,25.0\n");
        let result = VisitFileLoader::load(
            std::path::Path::new("/nonexistent/photom.csv"),
            exposure.path(),
            VisitId(1),
            &PipelineConfig::default(),
        );
        assert!(result.is_err());
    }

    /// Writes the band/aperture fixture as a combined Parquet file with an
    /// NUV exposure table in its footer.
    fn create_combined_parquet(dir: &std::path::Path) -> std::path::PathBuf {
        let csv = create_temp_csv(BAND_APERTURE_CSV);
        let mut df = parse_photometry_csv(csv.path()).unwrap();
        let path = dir.join("e23456-30s-photom.parquet");
        let mut file = File::create(&path).unwrap();
        ParquetWriter::new(&mut file)
            .with_key_value_metadata(Some(KeyValueMetadata::from_static(vec![(
                "nuv_exptime".to_string(),
                r#"[{"t0": 0.0, "t1": 30.0, "expt": 25.0}, {"t0": 30.0, "t1": 60.0, "expt": 25.0}]"#
                    .to_string(),
            )])))
            .finish(&mut df)
            .unwrap();
        path
    }

    #[test]
    fn test_visit_file_loader_combined_parquet() {
        let dir = tempfile::tempdir().unwrap();
        let path = create_combined_parquet(dir.path());
        let visit =
            VisitFileLoader::load_combined(&path, VisitId(23456), &PipelineConfig::default()).unwrap();
        assert_eq!(visit.exposure.len(), 2);
        assert_eq!(visit.exposure.total_exposure(), 50.0);
        assert_eq!(visit.light_curves.len(), 1);
        assert_eq!(visit.light_curves[0].object_id, ObjectId(10));
        assert_eq!(visit.light_curves[0].cps(), &[2.0, 2.0]);
    }

    #[test]
    fn test_combined_parquet_without_band_exposure() {
        let dir = tempfile::tempdir().unwrap();
        let path = create_combined_parquet(dir.path());
        let mut config = PipelineConfig::default();
        config.photometry.band = Band::Fuv;
        let err = VisitFileLoader::load_combined(&path, VisitId(23456), &config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::MissingBand { band: Band::Fuv, .. })
        ));
    }
}
