// src/prob/trace.rs

use crate::ad::types::ADFloat;
use crate::prob::distributions::DistributionTrait;
use crate::prob::{ProbError, ProbResult};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteKind {
    Sample,
    Observe,
    Param,
}

impl fmt::Display for SiteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiteKind::Sample => write!(f, "sample"),
            SiteKind::Observe => write!(f, "observe"),
            SiteKind::Param => write!(f, "param"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum SiteValue {
    Scalar(ADFloat),
    Param {
        shape: Vec<usize>,
        leaves: Vec<ADFloat>,
    },
}

#[derive(Debug, Clone)]
pub struct Site {
    pub name: String,
    pub kind: SiteKind,
    pub dist: Option<Rc<dyn DistributionTrait>>,
    pub value: SiteValue,
    pub log_pdf: ADFloat,
}

impl Site {
    pub fn is_reparameterized(&self) -> bool {
        self.dist.as_ref().is_some_and(|d| d.reparameterized())
    }

    pub fn scalar(&self) -> Option<ADFloat> {
        match &self.value {
            SiteValue::Scalar(v) => Some(*v),
            SiteValue::Param { .. } => None,
        }
    }
}

/// Sites in the order the program reached them.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    sites: Vec<Site>,
    index: HashMap<String, usize>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, site: Site) -> ProbResult<()> {
        if self.index.contains_key(&site.name) {
            return Err(ProbError::DuplicateSite { name: site.name });
        }
        self.index.insert(site.name.clone(), self.sites.len());
        self.sites.push(site);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Site> {
        self.index.get(name).map(|&i| &self.sites[i])
    }

    /// Like `get`, but a missing site is an error naming `trace`.
    pub fn site(&self, name: &str, trace: &'static str) -> ProbResult<&Site> {
        self.get(name).ok_or_else(|| ProbError::MissingSite {
            name: name.to_string(),
            trace,
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.sites.iter().map(|s| s.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Site> {
        self.sites.iter()
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Joint log-density: the sum over sample and observe sites.
    pub fn log_pdf(&self) -> ADFloat {
        self.sites
            .iter()
            .filter(|s| s.kind != SiteKind::Param)
            .map(|s| s.log_pdf)
            .fold(ADFloat::Concrete(0.0), |acc, lp| acc + lp)
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.sites
            .iter()
            .filter(|s| s.kind == SiteKind::Param)
            .map(|s| s.name.as_str())
    }
}

impl<'a> IntoIterator for &'a Trace {
    type Item = &'a Site;
    type IntoIter = std::slice::Iter<'a, Site>;

    fn into_iter(self) -> Self::IntoIter {
        self.sites.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prob::distributions::Normal;

    fn scalar_site(name: &str, kind: SiteKind, log_pdf: f64) -> Site {
        Site {
            name: name.to_string(),
            kind,
            dist: Some(Rc::new(Normal::new(0.0, 1.0))),
            value: SiteValue::Scalar(ADFloat::Concrete(0.0)),
            log_pdf: ADFloat::Concrete(log_pdf),
        }
    }

    #[test]
    fn test_insertion_order_is_kept() {
        let mut trace = Trace::new();
        for name in ["c", "a", "b"] {
            trace.insert(scalar_site(name, SiteKind::Sample, 0.0)).unwrap();
        }
        assert_eq!(trace.keys().collect::<Vec<_>>(), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_duplicate_site_rejected() {
        let mut trace = Trace::new();
        trace.insert(scalar_site("z", SiteKind::Sample, 0.0)).unwrap();
        let err = trace.insert(scalar_site("z", SiteKind::Observe, 0.0)).unwrap_err();
        assert_eq!(err, ProbError::DuplicateSite { name: "z".into() });
    }

    #[test]
    fn test_log_pdf_skips_params() {
        let mut trace = Trace::new();
        trace.insert(scalar_site("z", SiteKind::Sample, -1.0)).unwrap();
        trace.insert(scalar_site("x", SiteKind::Observe, -2.5)).unwrap();
        trace
            .insert(Site {
                name: "loc".into(),
                kind: SiteKind::Param,
                dist: None,
                value: SiteValue::Param {
                    shape: vec![],
                    leaves: vec![ADFloat::Concrete(3.0)],
                },
                log_pdf: ADFloat::Concrete(100.0),
            })
            .unwrap();

        assert_eq!(trace.log_pdf().value(), -3.5);
        assert_eq!(trace.param_names().collect::<Vec<_>>(), vec!["loc"]);
        assert!(matches!(
            trace.site("missing", "guide"),
            Err(ProbError::MissingSite { trace: "guide", .. })
        ));
    }
}
