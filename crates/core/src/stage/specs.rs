//! Static stage catalogue.

use crate::raster::{Polarization, SubdatasetRef};

use super::{NormalizationKind, StageName, StageScope};

/// The band derived from VV and VH in dual-polarization composites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedBand {
    /// VV / VH.
    Ratio,
    /// VH / VV.
    RatioInverse,
    Product,
    Difference,
}

/// How a stage turns its input bands into output channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageAlgorithm {
    /// Each read band is stretched into its own channel.
    Composite,
    /// `(band 1 - band 2) / (band 1 + band 2)` over the two read bands.
    NormalizedDifference,
    /// `[vv, vh, derived]` from the two prepared polarizations.
    DualPolarization(DerivedBand),
}

/// What a stage reads and how it renders it.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSpec {
    pub name: StageName,
    /// One entry per opened dataset; composites of several datasets read
    /// the same band indices from each.
    pub inputs: Vec<SubdatasetRef>,
    /// 1-based band indices read from each input.
    pub band_indices: Vec<usize>,
    pub output_channels: usize,
    pub normalization: NormalizationKind,
    pub algorithm: StageAlgorithm,
    /// Lower percentile for `NormalizationKind::Percentile`.
    pub percentile: f64,
}

const TCI: usize = 3;
const TEN_METRE: usize = 0;
const TWENTY_METRE: usize = 1;

impl StageSpec {
    /// The catalogue entry for `name` at the given scope.
    ///
    /// Only the vegetation index depends on scope: a box-scoped index is
    /// stretched to bytes, a whole-tile index is rendered through a color ramp.
    pub fn for_stage(name: StageName, scope: StageScope, percentile: f64) -> Self {
        use StageName::*;

        let polarizations = vec![
            SubdatasetRef::Amplitude(Polarization::Vv),
            SubdatasetRef::Amplitude(Polarization::Vh),
        ];
        let spec = |inputs: Vec<SubdatasetRef>,
                    band_indices: Vec<usize>,
                    output_channels: usize,
                    normalization: NormalizationKind,
                    algorithm: StageAlgorithm| StageSpec {
            name,
            inputs,
            band_indices,
            output_channels,
            normalization,
            algorithm,
            percentile,
        };

        match name {
            TrueColor => spec(
                vec![SubdatasetRef::Index(TCI)],
                vec![1, 2, 3],
                3,
                NormalizationKind::MinMax,
                StageAlgorithm::Composite,
            ),
            FalseColorNir => spec(
                vec![SubdatasetRef::Index(TEN_METRE)],
                vec![4, 2, 3],
                3,
                NormalizationKind::Percentile,
                StageAlgorithm::Composite,
            ),
            AtmosphericPenetration => spec(
                vec![SubdatasetRef::Index(TWENTY_METRE)],
                vec![6, 5, 4],
                3,
                NormalizationKind::Percentile,
                StageAlgorithm::Composite,
            ),
            VegetationIndex => spec(
                vec![SubdatasetRef::Index(TEN_METRE)],
                vec![4, 1],
                1,
                match scope {
                    StageScope::Box => NormalizationKind::FixedRange,
                    StageScope::Tile => NormalizationKind::ColorRamp,
                },
                StageAlgorithm::NormalizedDifference,
            ),
            PolarizationVv => spec(
                vec![SubdatasetRef::Amplitude(Polarization::Vv)],
                vec![1],
                1,
                NormalizationKind::Percentile,
                StageAlgorithm::Composite,
            ),
            PolarizationVh => spec(
                vec![SubdatasetRef::Amplitude(Polarization::Vh)],
                vec![1],
                1,
                NormalizationKind::Percentile,
                StageAlgorithm::Composite,
            ),
            Ratio => spec(
                polarizations,
                vec![1],
                3,
                NormalizationKind::Percentile,
                StageAlgorithm::DualPolarization(DerivedBand::Ratio),
            ),
            RatioInverse => spec(
                polarizations,
                vec![1],
                3,
                NormalizationKind::Percentile,
                StageAlgorithm::DualPolarization(DerivedBand::RatioInverse),
            ),
            Product => spec(
                polarizations,
                vec![1],
                3,
                NormalizationKind::Percentile,
                StageAlgorithm::DualPolarization(DerivedBand::Product),
            ),
            Difference => spec(
                polarizations,
                vec![1],
                3,
                NormalizationKind::Percentile,
                StageAlgorithm::DualPolarization(DerivedBand::Difference),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_stage_has_a_spec() {
        for name in StageName::ALL {
            let spec = StageSpec::for_stage(name, StageScope::Tile, 2.0);
            assert_eq!(spec.name, name);
            assert!(!spec.inputs.is_empty());
            assert!(!spec.band_indices.is_empty());
            let reads_amplitude = spec
                .inputs
                .iter()
                .any(|i| matches!(i, SubdatasetRef::Amplitude(_)));
            assert_eq!(reads_amplitude, name.family() == crate::catalog::SatelliteFamily::S1);
            let expected_channels = match name {
                StageName::VegetationIndex | StageName::PolarizationVv | StageName::PolarizationVh => 1,
                _ => 3,
            };
            assert_eq!(spec.output_channels, expected_channels);
        }
    }

    #[test]
    fn test_vegetation_index_scope() {
        let tile = StageSpec::for_stage(StageName::VegetationIndex, StageScope::Tile, 2.0);
        let bbox = StageSpec::for_stage(StageName::VegetationIndex, StageScope::Box, 2.0);
        assert_eq!(tile.normalization, NormalizationKind::ColorRamp);
        assert_eq!(bbox.normalization, NormalizationKind::FixedRange);
        assert_eq!(tile.band_indices, vec![4, 1]);
    }

    #[test]
    fn test_optical_table() {
        let tci = StageSpec::for_stage(StageName::TrueColor, StageScope::Tile, 2.0);
        assert_eq!(tci.inputs, vec![SubdatasetRef::Index(3)]);
        assert_eq!(tci.normalization, NormalizationKind::MinMax);

        let ap = StageSpec::for_stage(StageName::AtmosphericPenetration, StageScope::Tile, 0.5);
        assert_eq!(ap.inputs, vec![SubdatasetRef::Index(1)]);
        assert_eq!(ap.band_indices, vec![6, 5, 4]);
        assert_eq!(ap.percentile, 0.5);
    }

    #[test]
    fn test_dual_polarization_table() {
        let ratio = StageSpec::for_stage(StageName::RatioInverse, StageScope::Box, 2.0);
        assert_eq!(ratio.inputs.len(), 2);
        assert_eq!(ratio.output_channels, 3);
        assert_eq!(
            ratio.algorithm,
            StageAlgorithm::DualPolarization(DerivedBand::RatioInverse)
        );
    }
}
