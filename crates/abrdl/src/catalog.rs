use std::time::Duration;

use serde::Serialize;
use url::Url;

use crate::{
    address::{is_absolute_url, merge_baseurls},
    error::{AbrError, AbrResult},
    template::Template,
};

/// One encoded quality variant of the content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Representation {
    pub id: String,
    /// Declared bitrate in bits per second.
    pub bandwidth: u64,
    /// Media segment template, e.g. `$RepresentationID$/seg-$Number$.m4s`.
    pub media: String,
    /// Base address inherited from the closest `BaseURL` in the manifest.
    pub base_url: Option<String>,
    pub start_number: u64,

    pub initialization: Option<String>,
    /// Seconds of media per segment.
    pub segment_duration: Option<f64>,

    pub mime_type: Option<String>,
    pub codecs: Option<String>,
    pub width: Option<u64>,
    pub height: Option<u64>,
}

impl Representation {
    pub fn new(id: impl Into<String>, bandwidth: u64, media: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            bandwidth,
            media: media.into(),
            base_url: None,
            start_number: 1,
            initialization: None,
            segment_duration: None,
            mime_type: None,
            codecs: None,
            width: None,
            height: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_start_number(mut self, start_number: u64) -> Self {
        self.start_number = start_number;
        self
    }

    pub fn with_initialization(mut self, initialization: impl Into<String>) -> Self {
        self.initialization = Some(initialization.into());
        self
    }

    pub fn resolution(&self) -> Option<String> {
        self.width
            .and_then(|w| self.height.map(|h| (w, h)))
            .map(|(w, h)| format!("{w}x{h}"))
    }
}

/// The representations of one adaptation set, in manifest order.
///
/// A catalog is never empty and every media template carries `$Number$`.
#[derive(Debug, Clone, Serialize)]
pub struct RepresentationCatalog {
    representations: Vec<Representation>,
    presentation_duration: Option<Duration>,
}

impl RepresentationCatalog {
    pub fn new(representations: Vec<Representation>) -> AbrResult<Self> {
        if representations.is_empty() {
            return Err(AbrError::EmptyCatalog);
        }

        for representation in representations.iter() {
            if !Template::contains(&representation.media, Template::NUMBER) {
                return Err(AbrError::MissingPlaceholder {
                    representation: representation.id.clone(),
                    template: representation.media.clone(),
                    placeholder: Template::NUMBER,
                });
            }
        }

        Ok(Self {
            representations,
            presentation_duration: None,
        })
    }

    pub fn with_presentation_duration(mut self, duration: Option<Duration>) -> Self {
        self.presentation_duration = duration;
        self
    }

    /// Builds the catalog of one adaptation set of a parsed manifest.
    ///
    /// `manifest_url` is where the manifest was fetched from, used to resolve relative `BaseURL`s.
    pub fn from_mpd(
        mpd: &dash_mpd::MPD,
        manifest_url: Option<&Url>,
        period_index: usize,
        adaptation_index: usize,
    ) -> AbrResult<Self> {
        let period = mpd
            .periods
            .get(period_index)
            .ok_or(AbrError::NoSuchPeriod(period_index))?;
        let adaptation = period
            .adaptations
            .get(adaptation_index)
            .ok_or(AbrError::NoSuchAdaptationSet(adaptation_index))?;

        let mut base_url = None;
        if let Some(mpd_base_url) = mpd.base_url.first() {
            base_url = Some(join_base_url(manifest_url, base_url, &mpd_base_url.base)?);
        }
        if let Some(period_base_url) = period.BaseURL.first() {
            base_url = Some(join_base_url(manifest_url, base_url, &period_base_url.base)?);
        }
        if let Some(adaptation_base_url) = adaptation.BaseURL.first() {
            base_url = Some(join_base_url(
                manifest_url,
                base_url,
                &adaptation_base_url.base,
            )?);
        }

        let outer_template = adaptation.SegmentTemplate.as_ref();

        let mut representations = Vec::with_capacity(adaptation.representations.len());
        for (index, representation) in adaptation.representations.iter().enumerate() {
            let id = representation
                .id
                .clone()
                .unwrap_or_else(|| index.to_string());

            let base_url = match representation.BaseURL.first() {
                Some(rep_base_url) => Some(join_base_url(
                    manifest_url,
                    base_url.clone(),
                    &rep_base_url.base,
                )?),
                None => base_url.clone(),
            };

            let inner_template = representation.SegmentTemplate.as_ref();
            let media = inner_template
                .and_then(|t| t.media.clone())
                .or_else(|| outer_template.and_then(|t| t.media.clone()))
                .ok_or_else(|| AbrError::NoSegmentTemplate(id.clone()))?;
            let initialization = inner_template
                .and_then(|t| t.initialization.clone())
                .or_else(|| outer_template.and_then(|t| t.initialization.clone()));
            let start_number = inner_template
                .and_then(|t| t.startNumber)
                .or_else(|| outer_template.and_then(|t| t.startNumber))
                .unwrap_or(1);
            let timescale = inner_template
                .and_then(|t| t.timescale)
                .or_else(|| outer_template.and_then(|t| t.timescale))
                .unwrap_or(1);
            let segment_duration = inner_template
                .and_then(|t| t.duration)
                .or_else(|| outer_template.and_then(|t| t.duration))
                .map(|duration| duration as f64 / timescale as f64)
                .filter(|duration| *duration > 0.0);

            let bandwidth = representation
                .bandwidth
                .ok_or_else(|| AbrError::MissingBandwidth(id.clone()))?;

            representations.push(Representation {
                id,
                bandwidth,
                media,
                base_url,
                start_number,
                initialization,
                segment_duration,
                mime_type: representation
                    .mimeType
                    .clone()
                    .or_else(|| adaptation.mimeType.clone()),
                codecs: representation
                    .codecs
                    .clone()
                    .or_else(|| adaptation.codecs.clone()),
                width: representation.width,
                height: representation.height,
            });
        }

        let duration = period.duration.or(mpd.mediaPresentationDuration);
        Ok(Self::new(representations)?.with_presentation_duration(duration))
    }

    pub fn representations(&self) -> &[Representation] {
        &self.representations
    }

    pub fn iter(&self) -> impl Iterator<Item = &Representation> {
        self.representations.iter()
    }

    pub fn len(&self) -> usize {
        self.representations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.representations.is_empty()
    }

    pub fn first(&self) -> &Representation {
        &self.representations[0]
    }

    pub fn get(&self, id: &str) -> Option<&Representation> {
        self.representations.iter().find(|r| r.id == id)
    }

    pub fn presentation_duration(&self) -> Option<Duration> {
        self.presentation_duration
    }

    /// Number of segments covering the presentation, when both durations are known.
    pub fn segment_count(&self) -> Option<u64> {
        let total = self.presentation_duration?.as_secs_f64();
        let segment = self.first().segment_duration?;
        let count = (total / segment).ceil();
        (count >= 1.0).then_some(count as u64)
    }
}

fn join_base_url(
    manifest_url: Option<&Url>,
    current: Option<String>,
    new: &str,
) -> AbrResult<String> {
    if is_absolute_url(new) {
        return Ok(new.to_string());
    }

    let parent = match current {
        Some(current) if is_absolute_url(&current) => Some(Url::parse(&current)?),
        Some(current) => return Ok(crate::address::join_path(&current, new)),
        None => manifest_url.cloned(),
    };

    match parent {
        Some(parent) => Ok(merge_baseurls(&parent, new)?.to_string()),
        None => Ok(new.to_string()),
    }
}
