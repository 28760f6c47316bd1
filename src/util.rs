pub(crate) fn sector_count_from_size(size: u64, sector_size: u64) -> u64 {
    if size == 0 {
        return 0;
    }

    ((size - 1) / sector_size) + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sector_count() {
        assert_eq!(sector_count_from_size(0, 1024), 0);
        assert_eq!(sector_count_from_size(1, 1024), 1);
        assert_eq!(sector_count_from_size(1024, 1024), 1);
        assert_eq!(sector_count_from_size(1025, 1024), 2);
        // 10,000 bytes split into 1,024-byte sectors
        assert_eq!(sector_count_from_size(10_000, 1024), 10);
    }
}
