/// File name of the adapter module, importable through `custom_imports`.
pub const LOADER_FILE_NAME: &str = "dataset_loader.py";

/// Module name listed in the artifact's `custom_imports`.
pub const LOADER_MODULE: &str = "dataset_loader";

/// Generic newline-delimited JSON loader registered as `SimpleJsonlDataset`.
pub const LOADER_SOURCE: &str = r#"import json

from datasets import Dataset
from opencompass.datasets.base import BaseDataset
from opencompass.registry import LOAD_DATASET


@LOAD_DATASET.register_module()
class SimpleJsonlDataset(BaseDataset):

    @staticmethod
    def load(path, **kwargs):
        rows = []
        with open(path, 'r', encoding='utf-8') as f:
            for line in f:
                line = line.strip()
                if not line:
                    continue
                row = json.loads(line)
                rows.append({k: v if isinstance(v, str) else json.dumps(v, ensure_ascii=False)
                             for k, v in row.items()})
        return Dataset.from_list(rows)
"#;
