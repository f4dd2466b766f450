use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
  None,
  Subscriber,
  Special,
}

/// Guild roles granting each tier.
#[derive(Debug, Clone, Default)]
pub struct TierRoles {
  pub special: HashSet<u64>,
  pub subscriber: HashSet<u64>,
}

impl TierRoles {
  /// Special outranks subscriber when a member holds both.
  pub fn resolve(&self, roles: &[u64]) -> Tier {
    if roles.iter().any(|r| self.special.contains(r)) {
      Tier::Special
    } else if roles.iter().any(|r| self.subscriber.contains(r)) {
      Tier::Subscriber
    } else {
      Tier::None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn roles() -> TierRoles {
    TierRoles {
      special: HashSet::from([1, 2]),
      subscriber: HashSet::from([10, 11]),
    }
  }

  #[test]
  fn special_wins() {
    assert_eq!(roles().resolve(&[11, 2]), Tier::Special);
  }

  #[test]
  fn subscriber_and_none() {
    assert_eq!(roles().resolve(&[5, 10]), Tier::Subscriber);
    assert_eq!(roles().resolve(&[5]), Tier::None);
    assert_eq!(roles().resolve(&[]), Tier::None);
  }
}
